//! LLM provider implementations.

pub mod replay;

pub use replay::{ReplayError, ReplayProvider};
