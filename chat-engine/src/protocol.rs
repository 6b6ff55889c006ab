//! Client-facing wire shapes for the `/chat/` endpoint (§6).

use serde::{Deserialize, Serialize};

pub const END_CMD: i64 = -1;

/// First frame on the socket: authentication placeholder, logged only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartFrame {
    pub timestamp: i64,
    pub from: String,
}

/// Every subsequent client frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatFrame {
    pub cmd: i64,
    pub msg: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndEnvelope {
    pub code: i32,
    pub msg: String,
}

impl EndEnvelope {
    pub fn session_ended() -> Self {
        Self {
            code: 0,
            msg: "对话结束".to_string(),
        }
    }
}
