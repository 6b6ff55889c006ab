//! Shared types for the psych-digital dialogue core.
//!
//! Everything in `chat-engine`, `asr-client`, and `report-consumer` that
//! needs a common vocabulary (turn roles, error kinds, config, logging
//! init) lives here so the three subsystems stay decoupled from each
//! other's internals.

pub mod config;
pub mod error;
pub mod logging;
pub mod turn;

pub use config::Config;
pub use error::CoreError;
pub use turn::{Role, Turn};
