//! Execution engine and port definitions for Ravel.
//!
//! This crate drives an agent through repeated model/tool cycles and defines
//! the "ports" (provider, tool, discovery, history traits) that the
//! infrastructure layer implements. It depends only on `ravel-types` -- never
//! on `ravel-infra` or any file/network crate.

pub mod agent;
pub mod error;
pub mod event;
pub mod llm;
pub mod memory;
pub mod repository;
pub mod retry;
pub mod stream;
pub mod tool;

pub use error::EngineError;
