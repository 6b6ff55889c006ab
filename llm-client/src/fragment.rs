//! Wire shape of one streamed chat fragment (§3, §6).

use serde::{Deserialize, Serialize};

/// Terminal marker carried on a fragment. The upstream's vocabulary is
/// open-ended; anything not recognized round-trips as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finish {
    Continue,
    Break,
    Stop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatFragment {
    pub id: u64,
    pub content: String,
    #[serde(rename = "session_id")]
    pub session_id: String,
    pub timestamp: i64,
    pub finish: Finish,
}

impl ChatFragment {
    /// The sentinel emitted when a forwarder is interrupted by barge-in.
    pub fn break_sentinel() -> Self {
        Self {
            id: 0,
            content: String::new(),
            session_id: String::new(),
            timestamp: 0,
            finish: Finish::Break,
        }
    }
}
