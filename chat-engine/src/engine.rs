//! The chat session engine (§4.B) — one instance per upgraded client
//! WebSocket, grounded on the source's `Engine` (`engine.go`) and on the
//! teacher's `handle_connection`/`sender_task` forwarding-channel pattern
//! for funneling concurrent writers through one socket.

use crate::cancel::{cancel_pair, CancelSource, CancelToken};
use crate::protocol::{ChatFrame, EndEnvelope, StartFrame, END_CMD};
use history_cache::HistoryCache;
use llm_client::{ChatApp, ChatFragment};
use psych_core::CoreError;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::WebSocketStream;
use tracing::{error, info, warn};
use ws_framing::WsHelper;

const OUTW_CAPACITY: usize = 50;
const AI_HISTORY_CAPACITY: usize = 10;
const USER_HISTORY_CAPACITY: usize = 10;

/// Fixed greeting sent at the start of every session.
pub const GREETING: &str = "你好呀, 请问你是谁";

pub struct Engine<S> {
    ws: Arc<WsHelper<S>>,
    chat_app: Arc<dyn ChatApp>,
    cache: Arc<dyn HistoryCache>,
    greeting: String,

    cancel_source: CancelSource,
    cancel_token: CancelToken,

    session_id: Mutex<Option<String>>,

    outw_tx: mpsc::Sender<String>,
    outw_rx: tokio::sync::Mutex<Option<mpsc::Receiver<String>>>,

    ai_history_tx: mpsc::Sender<String>,
    ai_history_rx: tokio::sync::Mutex<Option<mpsc::Receiver<String>>>,

    user_history_tx: mpsc::Sender<String>,
    user_history_rx: tokio::sync::Mutex<Option<mpsc::Receiver<String>>>,

    /// Signal channel for the currently in-flight forwarder, replaced on
    /// every new launch so the read loop can interrupt it (barge-in).
    current_stop: tokio::sync::Mutex<Option<watch::Sender<bool>>>,
}

impl<S> Engine<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        ws: WebSocketStream<S>,
        chat_app: Arc<dyn ChatApp>,
        cache: Arc<dyn HistoryCache>,
    ) -> Arc<Self> {
        let (cancel_source, cancel_token) = cancel_pair();
        let (outw_tx, outw_rx) = mpsc::channel(OUTW_CAPACITY);
        let (ai_history_tx, ai_history_rx) = mpsc::channel(AI_HISTORY_CAPACITY);
        let (user_history_tx, user_history_rx) = mpsc::channel(USER_HISTORY_CAPACITY);

        Arc::new(Self {
            ws: Arc::new(WsHelper::new(ws)),
            chat_app,
            cache,
            greeting: GREETING.to_string(),
            cancel_source,
            cancel_token,
            session_id: Mutex::new(None),
            outw_tx,
            outw_rx: tokio::sync::Mutex::new(Some(outw_rx)),
            ai_history_tx,
            ai_history_rx: tokio::sync::Mutex::new(Some(ai_history_rx)),
            user_history_tx,
            user_history_rx: tokio::sync::Mutex::new(Some(user_history_rx)),
            current_stop: tokio::sync::Mutex::new(None),
        })
    }

    fn session_id(&self) -> String {
        self.session_id.lock().unwrap().clone().unwrap_or_default()
    }

    /// Perform handshake, send the greeting, obtain `sessionId`,
    /// initialize the history cache.
    pub async fn start(self: &Arc<Self>) -> Result<(), CoreError> {
        // Authentication is a logged-only placeholder; never reject (§4.B).
        match self.ws.read_json::<StartFrame>().await {
            Ok(start) => info!(from = %start.from, timestamp = start.timestamp, "session start"),
            Err(e) => warn!(error = %e, "failed to read start frame, continuing anyway"),
        }

        tokio::spawn(self.clone().tts_task());

        let greeting = self.greeting.clone();
        self.launch_forwarder(greeting.clone()).await;

        let first_utterance = {
            let mut guard = self.ai_history_rx.lock().await;
            let rx = guard.as_mut().expect("ai_history_rx taken twice");
            rx.recv().await.unwrap_or_default()
        };

        let session_id = self.session_id();
        self.cache.init(&session_id).await?;
        self.cache.add_system(&session_id, &greeting).await?;
        self.cache.add_ai(&session_id, &first_utterance).await?;
        Ok(())
    }

    /// Run the main read loop until the client ends the session or the
    /// socket fails.
    pub async fn chat(self: &Arc<Self>) -> Result<(), CoreError> {
        tokio::spawn(self.clone().history_writer_task());

        loop {
            let frame = match self.ws.read_json::<ChatFrame>().await {
                Ok(f) => f,
                Err(e) => {
                    warn!(error = %e, "chat read loop ending");
                    return Ok(());
                }
            };

            if frame.cmd == END_CMD {
                return Ok(());
            }

            let _ = self.user_history_tx.send(frame.msg.clone()).await;
            self.launch_forwarder(frame.msg).await;
        }
    }

    /// Write the termination envelope, cancel every subtask, close the
    /// socket. No-op if already closed.
    pub async fn end(self: &Arc<Self>) {
        if self.cancel_token.is_cancelled() {
            return;
        }
        if let Err(e) = self.ws.write_json(&EndEnvelope::session_ended()).await {
            error!(error = %e, "failed to write termination envelope");
        }
        self.cancel_source.cancel();
        let _ = self.ws.close().await;
    }

    /// Signal the previously launched forwarder (if any) to stop, then
    /// spawn a new one for `msg` (§4.B edge case: overlapping calls).
    async fn launch_forwarder(self: &Arc<Self>, msg: String) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut guard = self.current_stop.lock().await;
        if let Some(prev) = guard.replace(stop_tx) {
            let _ = prev.send(true);
        }
        drop(guard);

        let engine = self.clone();
        tokio::spawn(async move { engine.stream_call(msg, stop_rx).await });
    }

    /// Open an LLM scanner and forward fragments until end-of-stream,
    /// barge-in, cancellation, or error. Always publishes exactly one
    /// value to `aiHistory` before returning (invariant 2).
    async fn stream_call(self: Arc<Self>, msg: String, mut stop_rx: watch::Receiver<bool>) {
        enum Step {
            Continue,
            Stop,
            Cancelled,
            Eof,
            Error(CoreError),
        }

        let mut record = String::new();
        let mut cancel_token = self.cancel_token.clone();

        let marker = match self.chat_app.stream_call(&msg).await {
            Err(e) => format!("stop:{e}"),
            Ok(mut scanner) => {
                let outcome = loop {
                    let step = tokio::select! {
                        _ = cancel_token.cancelled() => Step::Cancelled,
                        _ = wait_for_stop(&mut stop_rx) => Step::Stop,
                        next = scanner.next() => match next {
                            Ok(Some(fragment)) => {
                                {
                                    let mut guard = self.session_id.lock().unwrap();
                                    if guard.is_none() {
                                        *guard = Some(fragment.session_id.clone());
                                    }
                                }
                                if let Err(e) = self.ws.write_json(&fragment).await {
                                    warn!(error = %e, "failed to forward fragment to client");
                                }
                                let _ = self.outw_tx.send(fragment.content.clone()).await;
                                record.push_str(&fragment.content);
                                Step::Continue
                            }
                            Ok(None) => Step::Eof,
                            Err(e) => Step::Error(e),
                        },
                    };

                    match step {
                        Step::Continue => continue,
                        other => break other,
                    }
                };

                scanner.close().await;

                match outcome {
                    Step::Stop => {
                        if let Err(e) = self.ws.write_json(&ChatFragment::break_sentinel()).await {
                            warn!(error = %e, "failed to write break sentinel");
                        }
                        "stop:interrupted".to_string()
                    }
                    Step::Cancelled => "stop:cancelled".to_string(),
                    Step::Eof => record,
                    Step::Error(e) => format!("stop:{e}"),
                    Step::Continue => unreachable!("loop only breaks on a terminal step"),
                }
            }
        };

        let _ = self.ai_history_tx.send(marker).await;
    }

    /// Pumps `outw` fragments to the (stubbed) TTS sink.
    async fn tts_task(self: Arc<Self>) {
        let mut rx = self
            .outw_rx
            .lock()
            .await
            .take()
            .expect("tts_task spawned twice");
        let mut cancel_token = self.cancel_token.clone();
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => return,
                word = rx.recv() => match word {
                    Some(word) => info!(%word, "tts"),
                    None => return,
                }
            }
        }
    }

    /// Drains `aiHistory`/`userHistory` into the cache, preserving
    /// per-channel arrival order (§5).
    async fn history_writer_task(self: Arc<Self>) {
        let mut ai_rx = self
            .ai_history_rx
            .lock()
            .await
            .take()
            .expect("history_writer_task spawned twice");
        let mut user_rx = self
            .user_history_rx
            .lock()
            .await
            .take()
            .expect("history_writer_task spawned twice");
        let mut cancel_token = self.cancel_token.clone();

        loop {
            let session_id = self.session_id();
            tokio::select! {
                _ = cancel_token.cancelled() => return,
                ai = ai_rx.recv() => match ai {
                    Some(utterance) => {
                        if let Err(e) = self.cache.add_ai(&session_id, &utterance).await {
                            error!(error = %e, "ai history write failed");
                        }
                    }
                    None => return,
                },
                user = user_rx.recv() => match user {
                    Some(msg) => {
                        if let Err(e) = self.cache.add_user(&session_id, &msg).await {
                            error!(error = %e, "user history write failed");
                        }
                    }
                    None => return,
                },
            }
        }
    }
}

async fn wait_for_stop(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            futures_util::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChatFrame, StartFrame};
    use history_cache::InMemoryHistoryCache;
    use llm_client::stub::StubChatApp;
    use psych_core::Role;
    use tokio_tungstenite::tungstenite::protocol::Role as WsRole;

    fn client_server_pair() -> (WsHelper<tokio::io::DuplexStream>, WebSocketStream<tokio::io::DuplexStream>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let client_ws = WebSocketStream::from_raw_socket(client_io, WsRole::Client, None);
        let server_ws = WebSocketStream::from_raw_socket(server_io, WsRole::Server, None);
        (WsHelper::new(client_ws), server_ws)
    }

    #[tokio::test]
    async fn happy_path_builds_expected_cache_order() {
        let (client, server_ws) = client_server_pair();
        let cache = Arc::new(InMemoryHistoryCache::new());
        let chat_app = Arc::new(StubChatApp::new("sid-fixed"));
        let engine = Engine::new(server_ws, chat_app, cache.clone());

        client
            .write_json(&StartFrame {
                timestamp: 1_700_000_000,
                from: "test".to_string(),
            })
            .await
            .unwrap();

        let engine_for_start = engine.clone();
        tokio::spawn(async move { engine_for_start.start().await.unwrap() });

        // Greeting stream fragments, one per character.
        loop {
            let v: serde_json::Value = client.read_json().await.unwrap();
            if v.get("finish").and_then(|f| f.as_str()) == Some("stop") {
                break;
            }
        }

        let engine_for_chat = engine.clone();
        let chat_task = tokio::spawn(async move { engine_for_chat.chat().await.unwrap() });

        client
            .write_json(&ChatFrame {
                cmd: 0,
                msg: "你好".to_string(),
            })
            .await
            .unwrap();

        loop {
            let v: serde_json::Value = client.read_json().await.unwrap();
            if v.get("finish").and_then(|f| f.as_str()) == Some("stop") {
                break;
            }
        }

        client.write_json(&ChatFrame { cmd: -1, msg: String::new() }).await.unwrap();
        chat_task.await.unwrap();

        // allow the history writer task one scheduling slot to drain the
        // last aiHistory publish
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let turns = cache.load("sid-fixed").await.unwrap();
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::Ai, Role::User, Role::Ai]);
    }

    #[tokio::test]
    async fn every_forwarder_publishes_exactly_one_ai_history_value() {
        let (client, server_ws) = client_server_pair();
        let cache = Arc::new(InMemoryHistoryCache::new());
        let chat_app = Arc::new(StubChatApp::new("sid-2"));
        let engine = Engine::new(server_ws, chat_app, cache);

        client
            .write_json(&StartFrame { timestamp: 0, from: "t".to_string() })
            .await
            .unwrap();

        engine.start().await.unwrap();

        // drain greeting fragments already on the wire
        loop {
            let v: serde_json::Value = client.read_json().await.unwrap();
            if v.get("finish").and_then(|f| f.as_str()) == Some("stop") {
                break;
            }
        }

        // ai_history_rx should be empty right after start(): exactly one
        // value was consumed by the rendezvous, none left over.
        let mut guard = engine.ai_history_rx.lock().await;
        let rx = guard.as_mut().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
