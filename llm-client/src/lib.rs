//! Streaming chat backend client and one-shot report backend client.
//!
//! The chat engine talks to the streaming side only through [`ChatApp`] and
//! [`Scanner`], never the concrete backend, so a stub or a real HTTP/SSE
//! client can be swapped in at construction.

pub mod fragment;
pub mod report;
pub mod stub;

pub use fragment::{ChatFragment, Finish};
pub use report::{Report, ReportApp};

use async_trait::async_trait;
use psych_core::CoreError;

/// One incremental step of a streaming chat call.
#[async_trait]
pub trait Scanner: Send {
    /// Yield the next fragment, or `Ok(None)` on clean end-of-stream.
    async fn next(&mut self) -> Result<Option<ChatFragment>, CoreError>;

    /// Release any resources held by the scanner. Idempotent.
    async fn close(&mut self);
}

/// A streaming LLM chat backend.
#[async_trait]
pub trait ChatApp: Send + Sync {
    async fn stream_call(&self, prompt: &str) -> Result<Box<dyn Scanner>, CoreError>;
}
