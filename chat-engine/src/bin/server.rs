//! `/chat/` WebSocket entrypoint, mirroring the teacher's
//! `start_call_server`/`handle_connection` accept loop.

use chat_engine::Engine;
use history_cache::{HistoryCache, InMemoryHistoryCache, RedisHistoryCache};
use llm_client::stub::StubChatApp;
use llm_client::ChatApp;
use psych_core::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tracing::{error, info};
use uuid::Uuid;

async fn handle_connection(stream: TcpStream, addr: SocketAddr, cache: Arc<dyn HistoryCache>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!(%addr, error = %e, "websocket handshake failed");
            return;
        }
    };

    info!(%addr, "chat connection established");

    // TODO: wire a real streaming backend once app credentials are plumbed
    // through Config; the stub keeps the accept loop exercisable today.
    let chat_app: Arc<dyn ChatApp> = Arc::new(StubChatApp::new(Uuid::new_v4().to_string()));
    let engine = Engine::new(ws_stream, chat_app, cache);

    if let Err(e) = engine.start().await {
        error!(%addr, error = %e, "session start failed");
        engine.end().await;
        return;
    }

    if let Err(e) = engine.chat().await {
        error!(%addr, error = %e, "chat loop ended with error");
    }
    engine.end().await;

    info!(%addr, "chat connection closed");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    psych_core::logging::init();
    let config = Config::from_env()?;

    let cache: Arc<dyn HistoryCache> = match RedisHistoryCache::connect(
        &config.redis_host,
        config.redis_password.as_deref(),
    )
    .await
    {
        Ok(redis) => Arc::new(redis),
        Err(e) => {
            tracing::warn!(error = %e, "redis unavailable, falling back to in-memory cache");
            Arc::new(InMemoryHistoryCache::new())
        }
    };

    let addr = "0.0.0.0:8081";
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "chat engine listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let cache = cache.clone();
        tokio::spawn(handle_connection(stream, peer, cache));
    }
}
