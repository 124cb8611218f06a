//! Infrastructure layer for Ravel.
//!
//! Implements the ports defined in `ravel-core`: configuration loading from
//! `ravel.toml`, JSON-file history persistence, and the replay LLM provider
//! that serves recorded stream scripts.

pub mod config;
pub mod history;
pub mod llm;
