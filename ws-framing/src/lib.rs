//! Duplex-safe framed I/O over one WebSocket.
//!
//! Reads are single-consumer (the caller must serialize its own calls to
//! `read_json`/`read_bytes`, typically from one main loop). Writes may be
//! called concurrently from any number of tasks; the write-side mutex
//! guarantees one outbound frame is fully written before the next begins.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use psych_core::CoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

#[derive(Serialize)]
struct ErrorEnvelope {
    code: i32,
    msg: String,
}

/// Framed helper wrapping one `WebSocketStream`.
///
/// Generic over the underlying transport (`S`) so the same helper serves
/// both a server-accepted connection and a client-dialed one.
pub struct WsHelper<S> {
    write: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    read: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> WsHelper<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(ws: WebSocketStream<S>) -> Self {
        let (write, read) = ws.split();
        Self {
            write: Mutex::new(write),
            read: Mutex::new(read),
        }
    }

    /// Read one text frame and decode it as JSON.
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, CoreError> {
        match self.read_frame().await? {
            Message::Text(text) => Ok(serde_json::from_str(&text)?),
            _ => Err(CoreError::WrongFrameType),
        }
    }

    /// Read one binary frame.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, CoreError> {
        match self.read_frame().await? {
            Message::Binary(bytes) => Ok(bytes.to_vec()),
            _ => Err(CoreError::WrongFrameType),
        }
    }

    async fn read_frame(&self) -> Result<Message, CoreError> {
        let mut read = self.read.lock().await;
        loop {
            match read.next().await {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(msg)) => return Ok(msg),
                Some(Err(e)) => return Err(CoreError::WsUpgrade(e.to_string())),
                None => return Err(CoreError::WsUpgrade("connection closed".to_string())),
            }
        }
    }

    /// Serialize `obj` and send it as one text frame.
    pub async fn write_json<T: Serialize + Sync>(&self, obj: &T) -> Result<(), CoreError> {
        let text = serde_json::to_string(obj)?;
        let mut write = self.write.lock().await;
        write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| CoreError::WsUpgrade(e.to_string()))
    }

    /// Send one binary frame.
    pub async fn write_bytes(&self, bytes: Vec<u8>) -> Result<(), CoreError> {
        let mut write = self.write.lock().await;
        write
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| CoreError::WsUpgrade(e.to_string()))
    }

    /// Convenience for `write_json` of an error envelope.
    pub async fn write_error(&self, code: i32, msg: impl Into<String>) -> Result<(), CoreError> {
        self.write_json(&ErrorEnvelope {
            code,
            msg: msg.into(),
        })
        .await
    }

    pub async fn close(&self) -> Result<(), CoreError> {
        let mut write = self.write.lock().await;
        write
            .close()
            .await
            .map_err(|e| CoreError::WsUpgrade(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::Value;
    use tokio_tungstenite::tungstenite::protocol::Role;

    /// Build a connected pair of raw `WebSocketStream`s over an in-memory
    /// duplex pipe, skipping the HTTP upgrade handshake (nothing here
    /// depends on it).
    fn ws_pair() -> (
        WebSocketStream<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None);
        (client, server)
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Ping {
        n: u32,
    }

    #[tokio::test]
    async fn write_json_then_read_json_round_trips() {
        let (client_ws, server_ws) = ws_pair();
        let client = WsHelper::new(client_ws);
        let server = WsHelper::new(server_ws);

        client.write_json(&Ping { n: 7 }).await.unwrap();
        let got: Ping = server.read_json().await.unwrap();
        assert_eq!(got, Ping { n: 7 });
    }

    #[tokio::test]
    async fn non_text_frame_fails_read_json() {
        let (client_ws, server_ws) = ws_pair();
        let client = WsHelper::new(client_ws);
        let server = WsHelper::new(server_ws);

        client.write_bytes(vec![1, 2, 3]).await.unwrap();
        let err = server.read_json::<Value>().await.unwrap_err();
        assert!(matches!(err, CoreError::WrongFrameType));
    }

    #[tokio::test]
    async fn concurrent_writes_produce_well_formed_frames() {
        use std::sync::Arc;

        let (client_ws, server_ws) = ws_pair();
        let client = Arc::new(WsHelper::new(client_ws));
        let server = WsHelper::new(server_ws);

        let n_writers = 8;
        let mut handles = Vec::new();
        for i in 0..n_writers {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client.write_json(&Ping { n: i }).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        for _ in 0..n_writers {
            let got: Ping = server.read_json().await.unwrap();
            seen.insert(got.n);
        }
        assert_eq!(seen.len(), n_writers as usize);
    }
}
