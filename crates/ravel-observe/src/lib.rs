//! Observability setup for Ravel binaries.
//!
//! - `tracing_setup`: global subscriber (fmt + env filter, optional OTel export)
//! - `genai_attrs`: GenAI semantic-convention field names for spans

pub mod genai_attrs;
pub mod tracing_setup;

pub use tracing_setup::{LogFormat, TracingOptions, init_tracing, init_tracing_with, shutdown_tracing};
