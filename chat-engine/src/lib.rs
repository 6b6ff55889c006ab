pub mod cancel;
pub mod engine;
pub mod protocol;

pub use engine::{Engine, GREETING};
