//! Repository trait definitions for Ravel.
//!
//! Storage ports implemented by `ravel-infra`.

pub mod history;

pub use history::HistoryStore;
