//! In-memory backing for [`crate::HistoryCache`].
//!
//! Mirrors the Go source's `MemoryRedisHelper`, kept around as the
//! default for local development and tests so the engine never needs a
//! live Redis to run.

use crate::HistoryCache;
use async_trait::async_trait;
use parking_lot::Mutex;
use psych_core::{CoreError, Role, Turn};
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryHistoryCache {
    data: Mutex<HashMap<String, Vec<Turn>>>,
}

impl InMemoryHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryCache for InMemoryHistoryCache {
    async fn init(&self, session_id: &str) -> Result<(), CoreError> {
        self.data.lock().remove(session_id);
        Ok(())
    }

    async fn add(&self, session_id: &str, role: Role, content: &str) -> Result<(), CoreError> {
        self.data
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .push(Turn::new(role, content.to_string()));
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Vec<Turn>, CoreError> {
        Ok(self.data.lock().get(session_id).cloned().unwrap_or_default())
    }

    async fn remove(&self, session_id: &str) -> Result<(), CoreError> {
        self.data.lock().remove(session_id);
        Ok(())
    }
}
