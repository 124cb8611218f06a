//! History persistence backends.

pub mod json_store;

pub use json_store::JsonFileHistoryStore;
