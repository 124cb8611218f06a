//! LLM provider abstractions for Ravel.
//!
//! - `LlmProvider`: object-safe trait for streaming model backends
//! - `ProviderRegistry`: name-indexed lookup that resolves an agent's provider list
//! - `FallbackChain`: priority-ordered failover with per-provider circuit breakers

pub mod fallback;
pub mod health;
pub mod provider;
pub mod registry;

pub use fallback::FallbackChain;
pub use provider::{LlmProvider, LlmStream, error_stream};
pub use registry::ProviderRegistry;
