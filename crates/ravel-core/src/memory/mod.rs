//! Bounded conversation history.
//!
//! - `ConversationMemory`: owns the running message list and keeps it within
//!   count and token limits without breaking call/result pairing
//! - `tokens`: the coarse token heuristic used for budgeting

pub mod manager;
pub mod tokens;

pub use manager::ConversationMemory;
