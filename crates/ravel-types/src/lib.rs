//! Shared domain types for Ravel.
//!
//! This crate contains the data shapes used across the engine: conversation
//! messages, provider stream events, tool schemas and results, observer
//! events, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod message;
pub mod tool;
