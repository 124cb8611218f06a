//! Retry and recovery around a single model invocation.

pub mod policy;

pub use policy::{RetryPolicy, RetryState};
