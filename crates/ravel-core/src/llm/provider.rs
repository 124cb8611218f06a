//! LlmProvider trait definition.
//!
//! The one capability the engine needs from a model backend is a streamed
//! invocation. `stream` returns a boxed `'static` stream so providers can be
//! held as `Arc<dyn LlmProvider>` and swapped at runtime.

use std::pin::Pin;

use futures_util::Stream;

use ravel_types::llm::{LlmError, LlmRequest, StreamEvent};

/// Stream of provider events for a single model invocation.
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for LLM provider backends.
///
/// Cancellation is enforced by the consumer dropping the returned stream.
/// Implementations live in ravel-infra (e.g., `ReplayProvider`) or in the
/// embedding application.
pub trait LlmProvider: Send + Sync {
    /// Registry name (e.g., "primary").
    fn name(&self) -> &str;

    /// Start a streamed invocation. Errors may surface as the first item.
    fn stream(&self, request: LlmRequest) -> LlmStream;
}

/// Stream that yields a single error. Used when no provider can take a request.
pub fn error_stream(error: LlmError) -> LlmStream {
    Box::pin(futures_util::stream::once(async move { Err(error) }))
}
