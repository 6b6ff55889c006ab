pub mod client;
pub mod frame;

pub use client::{AsrClient, State};
