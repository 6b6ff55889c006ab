//! A turn-ordered cache keyed by session id, shared by the chat engine
//! (writer) and the report consumer (reader + deleter).
//!
//! One trait, two interchangeable backings chosen at construction —
//! the same shape the rest of the workspace uses for swappable storage
//! adapters (`AdapterRegistry`/`DatabaseAdapter` in the data-daemon crate).

pub mod memory;
pub mod redis_backed;

use async_trait::async_trait;
use psych_core::{CoreError, Role, Turn};

/// Append-only, per-session ordered list of turns.
///
/// All operations are internally serialized; append order on the same key
/// is preserved regardless of caller concurrency.
#[async_trait]
pub trait HistoryCache: Send + Sync {
    /// Clear any prior entry for `session_id` (idempotent).
    async fn init(&self, session_id: &str) -> Result<(), CoreError>;

    async fn add_ai(&self, session_id: &str, content: &str) -> Result<(), CoreError> {
        self.add(session_id, Role::Ai, content).await
    }

    async fn add_user(&self, session_id: &str, content: &str) -> Result<(), CoreError> {
        self.add(session_id, Role::User, content).await
    }

    async fn add_system(&self, session_id: &str, content: &str) -> Result<(), CoreError> {
        self.add(session_id, Role::System, content).await
    }

    async fn add(&self, session_id: &str, role: Role, content: &str) -> Result<(), CoreError>;

    /// Load the full ordered turn list for `session_id`. Missing keys
    /// return an empty vector, not an error.
    async fn load(&self, session_id: &str) -> Result<Vec<Turn>, CoreError>;

    /// Delete the entry for `session_id`. Idempotent.
    async fn remove(&self, session_id: &str) -> Result<(), CoreError>;
}

pub use memory::InMemoryHistoryCache;
pub use redis_backed::RedisHistoryCache;
