//! Redis-backed implementation of [`crate::HistoryCache`], grounded on the
//! source's `RedisHelper` (`RPUSH` append, `DEL` init/remove).

use crate::HistoryCache;
use async_trait::async_trait;
use psych_core::{CoreError, Role, Turn};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct StoredTurn {
    role: String,
    content: String,
}

pub struct RedisHistoryCache {
    conn: ConnectionManager,
}

impl RedisHistoryCache {
    pub async fn connect(host: &str, password: Option<&str>) -> Result<Self, CoreError> {
        let url = match password {
            Some(pw) => format!("redis://:{pw}@{host}"),
            None => format!("redis://{host}"),
        };
        let client = redis::Client::open(url).map_err(|e| CoreError::CacheError(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CoreError::CacheError(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl HistoryCache for RedisHistoryCache {
    async fn init(&self, session_id: &str) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(session_id)
            .await
            .map_err(|e| CoreError::CacheError(e.to_string()))
    }

    async fn add(&self, session_id: &str, role: Role, content: &str) -> Result<(), CoreError> {
        let entry = StoredTurn {
            role: role.as_str().to_string(),
            content: content.to_string(),
        };
        let data = serde_json::to_string(&entry)?;
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(session_id, data)
            .await
            .map_err(|e| CoreError::CacheError(e.to_string()))
    }

    async fn load(&self, session_id: &str) -> Result<Vec<Turn>, CoreError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn
            .lrange(session_id, 0, -1)
            .await
            .map_err(|e| CoreError::CacheError(e.to_string()))?;

        raw.into_iter()
            .map(|entry| {
                let stored: StoredTurn = serde_json::from_str(&entry)?;
                let role = match stored.role.as_str() {
                    "system" => Role::System,
                    "user" => Role::User,
                    _ => Role::Ai,
                };
                Ok(Turn::new(role, stored.content))
            })
            .collect()
    }

    async fn remove(&self, session_id: &str) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(session_id)
            .await
            .map_err(|e| CoreError::CacheError(e.to_string()))
    }
}
