//! Shared error kinds (spec §7).
//!
//! Each subsystem mostly works in its own error type and converts into
//! this one at its public boundary, so callers across crate lines see one
//! vocabulary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("websocket upgrade failed: {0}")]
    WsUpgrade(String),

    #[error("expected a different frame type")]
    WrongFrameType,

    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid user")]
    InvalidUser,

    #[error("llm stream error: {0}")]
    LlmStreamError(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("asr server error (code {code}): {msg}")]
    AsrServerError { code: i32, msg: String },

    #[error("unknown asr frame type: {0}")]
    UnknownFrameType(u8),

    #[error("rpc error: {0}")]
    RpcError(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
