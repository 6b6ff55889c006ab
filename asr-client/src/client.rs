//! Stateful ASR client, grounded on the source's `VcAsrApp`
//! (`volc_asr.go`): `dial` → `start` → `send`/`receive` → `close`.

use crate::frame::{self, ParsedFrame};
use futures_util::{SinkExt, StreamExt};
use psych_core::CoreError;
use serde::Serialize;
use serde_json::json;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    New,
    Dialed,
    Started,
    Streaming,
    Closed,
}

pub struct AsrClient {
    app_key: String,
    access_key: String,
    resource_id: String,
    url: String,

    conn_id: String,
    log_id: Option<String>,

    seq: i32,
    state: State,
    ws: Option<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>,
}

#[derive(Serialize)]
struct AudioParams {
    format: &'static str,
    sample_rate: u32,
    bits: u8,
    channels: u8,
    codec: &'static str,
}

impl AsrClient {
    pub fn new(app_key: impl Into<String>, access_key: impl Into<String>, resource_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            access_key: access_key.into(),
            resource_id: resource_id.into(),
            url: url.into(),
            conn_id: Uuid::new_v4().to_string(),
            log_id: None,
            seq: 0,
            state: State::New,
            ws: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn log_id(&self) -> Option<&str> {
        self.log_id.as_deref()
    }

    /// `NEW → DIALED`. Opens the WebSocket with auth headers, recording
    /// the server's `X-Tt-Logid` for diagnostics.
    pub async fn dial(&mut self) -> Result<(), CoreError> {
        if self.state != State::New {
            return Err(CoreError::WsUpgrade("dial called out of order".to_string()));
        }

        let mut request = self
            .url
            .clone()
            .into_client_request()
            .map_err(|e| CoreError::WsUpgrade(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert("X-Api-Resource-Id", self.resource_id.parse().unwrap());
        headers.insert("X-Api-Access-Key", self.access_key.parse().unwrap());
        headers.insert("X-Api-App-Key", self.app_key.parse().unwrap());
        headers.insert("X-Api-Connect-Id", self.conn_id.parse().unwrap());

        let (ws, response) = connect_async(request)
            .await
            .map_err(|e| CoreError::WsUpgrade(e.to_string()))?;

        if let Some(logid) = response.headers().get("X-Tt-Logid") {
            if let Ok(logid) = logid.to_str() {
                info!(%logid, "asr dial");
                self.log_id = Some(logid.to_string());
            }
        }

        self.ws = Some(ws);
        self.state = State::Dialed;
        Ok(())
    }

    /// `DIALED → STARTED`. Sends the handshake `FullClientRequest`.
    pub async fn start(&mut self, uid: &str) -> Result<(), CoreError> {
        if self.state != State::Dialed {
            return Err(CoreError::WsUpgrade("start called out of order".to_string()));
        }

        let payload = json!({
            "user": { "uid": uid },
            "audio": AudioParams {
                format: "pcm",
                sample_rate: 16000,
                bits: 16,
                channels: 1,
                codec: "raw",
            },
            "request": {
                "model_name": "bigmodel",
                "enable_punc": true,
            },
        });
        let payload_bytes = serde_json::to_vec(&payload)?;

        self.seq = 1;
        let request_frame = frame::build_full_client_request(self.seq, &payload_bytes)?;
        self.send_binary(request_frame).await?;

        self.state = State::Started;
        Ok(())
    }

    /// `STARTED|STREAMING → STREAMING`. Frames and sends one PCM chunk.
    pub async fn send(&mut self, chunk: &[u8]) -> Result<(), CoreError> {
        if !matches!(self.state, State::Started | State::Streaming) {
            return Err(CoreError::WsUpgrade("send called out of order".to_string()));
        }

        self.seq += 1;
        let audio_frame = frame::build_audio_only_request(self.seq, chunk)?;
        self.send_binary(audio_frame).await?;

        self.state = State::Streaming;
        Ok(())
    }

    /// Valid in `STARTED`/`STREAMING`. Yields one decoded frame; a
    /// negative returned sequence means "last frame", and the caller
    /// transitions to `CLOSED` after surfacing the payload.
    pub async fn receive(&mut self) -> Result<ParsedFrame, CoreError> {
        if !matches!(self.state, State::Started | State::Streaming) {
            return Err(CoreError::WsUpgrade("receive called out of order".to_string()));
        }

        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| CoreError::WsUpgrade("not dialed".to_string()))?;

        let msg = ws
            .next()
            .await
            .ok_or_else(|| CoreError::WsUpgrade("connection closed".to_string()))?
            .map_err(|e| CoreError::WsUpgrade(e.to_string()))?;

        let bytes = match msg {
            Message::Binary(b) => b,
            Message::Close(_) => {
                self.state = State::Closed;
                return Err(CoreError::WsUpgrade("connection closed".to_string()));
            }
            _ => return Err(CoreError::WrongFrameType),
        };

        let parsed = frame::parse(&bytes)?;
        if parsed.sequence < 0 {
            self.state = State::Closed;
        }
        Ok(parsed)
    }

    /// `any → CLOSED`. Closes the socket directly; no graceful
    /// negative-sequence terminal frame is sent (§9).
    pub async fn close(&mut self) -> Result<(), CoreError> {
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.close(None).await;
        }
        self.state = State::Closed;
        Ok(())
    }

    async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<(), CoreError> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| CoreError::WsUpgrade("not dialed".to_string()))?;
        ws.send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| CoreError::WsUpgrade(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_client_starts_in_new_state() {
        let client = AsrClient::new("app", "access", "resource", "ws://127.0.0.1:0/asr");
        assert_eq!(client.state(), State::New);
        assert!(client.log_id().is_none());
    }

    #[tokio::test]
    async fn start_before_dial_is_rejected() {
        let mut client = AsrClient::new("app", "access", "resource", "ws://127.0.0.1:0/asr");
        let err = client.start("uid-1").await.unwrap_err();
        assert!(matches!(err, CoreError::WsUpgrade(_)));
        assert_eq!(client.state(), State::New);
    }

    #[tokio::test]
    async fn send_before_start_is_rejected() {
        let mut client = AsrClient::new("app", "access", "resource", "ws://127.0.0.1:0/asr");
        let err = client.send(b"pcm").await.unwrap_err();
        assert!(matches!(err, CoreError::WsUpgrade(_)));
    }

    #[tokio::test]
    async fn receive_before_start_is_rejected() {
        let mut client = AsrClient::new("app", "access", "resource", "ws://127.0.0.1:0/asr");
        let err = client.receive().await.unwrap_err();
        assert!(matches!(err, CoreError::WsUpgrade(_)));
    }

    #[tokio::test]
    async fn close_without_dial_is_a_noop_that_still_transitions() {
        let mut client = AsrClient::new("app", "access", "resource", "ws://127.0.0.1:0/asr");
        client.close().await.unwrap();
        assert_eq!(client.state(), State::Closed);
    }
}
