//! Persisted history records (§3) and the Mongo-backed store that inserts
//! them, grounded on the source's Mongo mapper (`MongoMapper::Insert`).

pub mod model;
pub mod mongo;

pub use model::{Dialog, History};

use async_trait::async_trait;
use psych_core::CoreError;

/// Insert-only store for finished session records.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert `history`, assigning an id if absent. A duplicate
    /// `session_id` on redelivery is rejected, not overwritten (§9).
    async fn insert(&self, history: &mut History) -> Result<(), CoreError>;
}

pub use mongo::MongoHistoryStore;
