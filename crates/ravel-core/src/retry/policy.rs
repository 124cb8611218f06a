//! Retry policy for model invocations.
//!
//! Wraps one logical model call with:
//! - compression before the first attempt when the history is large,
//! - quadratic backoff (`base_delay × n²`, n = failures so far) for transient
//!   failures, returning the original error once the budget is spent,
//! - compress-then-retry when a failure looks like a context overflow,
//! - one forced compression and resubmission when the model stops on its own
//!   output cap (`length`), outside the transport retry budget,
//! - cancellation checks around every attempt and wait.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ravel_types::config::RetryConfig;
use ravel_types::llm::{FinishReason, LlmError};
use ravel_types::message::Message;

use crate::error::EngineError;
use crate::memory::ConversationMemory;
use crate::stream::StepOutput;

/// Overflow recovery and `length` resubmission need at least this much
/// history to have anything worth compressing.
pub const MIN_MESSAGES_FOR_RECOVERY: usize = 5;

/// Bookkeeping for one logical invocation, including its retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts started, resubmissions included.
    pub attempt: u32,
    /// Failed attempts counted against the retry budget.
    pub failures: u32,
    pub total_backoff: Duration,
    /// Whether the one `length` resubmission has been used.
    pub forced_compression: bool,
}

/// Retry/recovery policy shared by every step of a run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Wait before the retry that follows the `failures`-th failure.
    pub fn backoff(&self, failures: u32) -> Duration {
        let n = u64::from(failures);
        Duration::from_millis(self.config.base_delay_ms.saturating_mul(n.saturating_mul(n)))
    }

    fn should_precompress(&self, memory: &ConversationMemory) -> bool {
        self.config.enable_compression
            && (memory.len() >= self.config.compress_message_threshold
                || memory.estimate_tokens() >= self.config.compress_token_threshold)
    }

    fn can_recover(&self, memory: &ConversationMemory) -> bool {
        self.config.enable_compression && memory.len() >= MIN_MESSAGES_FOR_RECOVERY
    }

    /// Run `call` against the current history until it yields usable output.
    ///
    /// `call` receives a snapshot of the history for each attempt, so a
    /// compression between attempts is visible to the next one. An output
    /// with no text and no tool calls is treated as a retryable
    /// [`LlmError::EmptyResponse`].
    pub async fn invoke<F, Fut>(
        &self,
        memory: &mut ConversationMemory,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<StepOutput, EngineError>
    where
        F: FnMut(Vec<Message>) -> Fut,
        Fut: Future<Output = Result<StepOutput, EngineError>>,
    {
        let mut state = RetryState::default();

        if self.should_precompress(memory) {
            tracing::debug!(
                messages = memory.len(),
                tokens = memory.estimate_tokens(),
                "History is large, compressing before first attempt"
            );
            memory.compress();
        }

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            state.attempt += 1;

            let result = match call(memory.messages().to_vec()).await {
                Ok(output)
                    if output.finish_reason == FinishReason::Length
                        && !state.forced_compression
                        && self.can_recover(memory) =>
                {
                    state.forced_compression = true;
                    tracing::warn!(
                        attempt = state.attempt,
                        messages = memory.len(),
                        "Model hit its output cap, compressing and resubmitting"
                    );
                    memory.compress();
                    continue;
                }
                Ok(output) if output.is_empty() => Err(EngineError::Llm(LlmError::EmptyResponse)),
                other => other,
            };

            let err = match result {
                Ok(output) => {
                    tracing::debug!(
                        attempts = state.attempt,
                        failures = state.failures,
                        backoff_ms = state.total_backoff.as_millis() as u64,
                        "Model invocation succeeded"
                    );
                    return Ok(output);
                }
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            state.failures += 1;
            if state.failures > self.config.max_retries {
                tracing::warn!(
                    attempts = state.attempt,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(err);
            }

            if err.is_context_overflow() && self.can_recover(memory) {
                tracing::warn!(error = %err, "Context overflow, compressing before retry");
                memory.compress();
            }

            let delay = self.backoff(state.failures);
            tracing::warn!(
                attempt = state.attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Model call failed, retrying"
            );

            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            state.total_backoff += delay;
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravel_types::config::MemoryConfig;
    use ravel_types::llm::Usage;
    use ravel_types::message::ContentPart;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn output(text: &str, finish_reason: FinishReason) -> StepOutput {
        StepOutput {
            parts: vec![ContentPart::text(text)],
            finish_reason,
            usage: Usage::default(),
        }
    }

    fn empty_output() -> StepOutput {
        StepOutput {
            parts: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    fn transient() -> EngineError {
        EngineError::Llm(LlmError::Overloaded("busy".to_string()))
    }

    fn memory_with(turns: usize) -> ConversationMemory {
        let mut memory = ConversationMemory::new(MemoryConfig::default());
        let mut messages = Vec::new();
        for i in 0..turns {
            if i % 2 == 0 {
                messages.push(Message::user(format!("question {i}")));
            } else {
                messages.push(Message::assistant(vec![ContentPart::text(format!("answer {i}"))]));
            }
        }
        memory.append(messages);
        memory
    }

    #[test]
    fn backoff_is_quadratic() {
        let policy = RetryPolicy::new(RetryConfig::default());
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(800));
        assert_eq!(policy.backoff(3), Duration::from_millis(1800));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_transient_failures() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(1);
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let result = policy
            .invoke(&mut memory, &CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok(output("recovered", FinishReason::Stop))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.text(), Some("recovered"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1100), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_returns_original_error() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(1);
        let calls = AtomicUsize::new(0);

        let err = policy
            .invoke(&mut memory, &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(EngineError::Llm(LlmError::Stream("reset".to_string()))) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Llm(LlmError::Stream(ref m)) if m == "reset"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_is_returned_immediately() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(1);
        let calls = AtomicUsize::new(0);

        let err = policy
            .invoke(&mut memory, &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(EngineError::Llm(LlmError::AuthenticationFailed)) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Llm(LlmError::AuthenticationFailed)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_output_is_retried() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(1);
        let calls = AtomicUsize::new(0);

        let result = policy
            .invoke(&mut memory, &CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(empty_output())
                    } else {
                        Ok(output("finally", FinishReason::Stop))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.text(), Some("finally"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_empty_output_surfaces_as_empty_response() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 1,
            ..RetryConfig::default()
        });
        let mut memory = memory_with(1);

        let err = policy
            .invoke(&mut memory, &CancellationToken::new(), |_| async {
                Ok(empty_output())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Llm(LlmError::EmptyResponse)));
    }

    #[tokio::test(start_paused = true)]
    async fn length_finish_forces_one_compression_and_resubmission() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(6);
        let calls = AtomicUsize::new(0);

        let result = policy
            .invoke(&mut memory, &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(output("cut off", FinishReason::Length)) }
            })
            .await
            .unwrap();

        // The resubmission also stops on length; it is returned as is.
        assert_eq!(result.finish_reason, FinishReason::Length);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memory.compression_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn length_finish_on_short_history_is_returned() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(3);
        let calls = AtomicUsize::new(0);

        policy
            .invoke(&mut memory, &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(output("cut off", FinishReason::Length)) }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memory.compression_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_error_compresses_before_retry() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(6);
        let calls = AtomicUsize::new(0);

        let result = policy
            .invoke(&mut memory, &CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(EngineError::Llm(LlmError::Provider {
                            message: "prompt is too long".to_string(),
                        }))
                    } else {
                        Ok(output("fits now", FinishReason::Stop))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.text(), Some("fits now"));
        assert_eq!(memory.compression_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn large_history_is_compressed_before_first_attempt() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(10);

        policy
            .invoke(&mut memory, &CancellationToken::new(), |_| async {
                Ok(output("ok", FinishReason::Stop))
            })
            .await
            .unwrap();
        assert_eq!(memory.compression_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_compression_never_compresses() {
        let policy = RetryPolicy::new(RetryConfig {
            enable_compression: false,
            ..RetryConfig::default()
        });
        let mut memory = memory_with(12);

        policy
            .invoke(&mut memory, &CancellationToken::new(), |_| async {
                Ok(output("cut", FinishReason::Length))
            })
            .await
            .unwrap();
        assert_eq!(memory.compression_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_retrying() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(1);
        let cancel = CancellationToken::new();
        let calls = AtomicUsize::new(0);

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let err = policy
            .invoke(&mut memory, &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_prevents_any_attempt() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let mut memory = memory_with(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicUsize::new(0);

        let err = policy
            .invoke(&mut memory, &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(output("never", FinishReason::Stop)) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
