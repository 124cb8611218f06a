//! Per-provider circuit breaker used by [`FallbackChain`](super::FallbackChain).
//!
//! A provider's circuit opens after [`FAILURE_THRESHOLD`] consecutive
//! failover errors and stays open for [`OPEN_WINDOW`]. The first call after
//! the window is a probe: success closes the circuit, failure reopens it.

use std::time::{Duration, Instant};

use ravel_types::llm::{LlmError, ProviderStatusInfo};

pub const FAILURE_THRESHOLD: u32 = 3;
pub const OPEN_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Circuit {
    Closed { failures: u32 },
    /// Skipped until `until`.
    Open { until: Instant },
    /// The next call is a probe.
    HalfOpen,
}

impl Circuit {
    fn label(&self) -> &'static str {
        match self {
            Circuit::Closed { .. } => "closed",
            Circuit::Open { .. } => "open",
            Circuit::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
pub struct ProviderHealth {
    pub name: String,
    /// Lower is tried first.
    pub priority: u32,
    pub circuit: Circuit,
    pub window: Duration,
    /// Set from a rate-limit hint; the provider is skipped until then even
    /// while its circuit is closed.
    pub throttled_until: Option<Instant>,
    last_error: Option<String>,
    calls: u64,
    failures: u64,
}

impl ProviderHealth {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            circuit: Circuit::Closed { failures: 0 },
            window: OPEN_WINDOW,
            throttled_until: None,
            last_error: None,
            calls: 0,
            failures: 0,
        }
    }

    /// Whether the provider may take a call at `now`. An open circuit whose
    /// window has passed turns half-open here.
    pub fn admits(&mut self, now: Instant) -> bool {
        if self.throttled_until.is_some_and(|until| now < until) {
            return false;
        }
        self.throttled_until = None;

        match self.circuit {
            Circuit::Open { until } if now < until => false,
            Circuit::Open { .. } => {
                self.circuit = Circuit::HalfOpen;
                true
            }
            Circuit::Closed { .. } | Circuit::HalfOpen => true,
        }
    }

    pub fn record_success(&mut self) {
        self.calls += 1;
        self.circuit = Circuit::Closed { failures: 0 };
    }

    pub fn record_failure(&mut self, error: &LlmError) {
        let now = Instant::now();
        self.calls += 1;
        self.failures += 1;
        self.last_error = Some(error.to_string());

        match self.circuit {
            Circuit::Closed { failures } if failures + 1 < FAILURE_THRESHOLD => {
                self.circuit = Circuit::Closed { failures: failures + 1 };
            }
            Circuit::Closed { .. } | Circuit::HalfOpen => {
                tracing::warn!(provider = %self.name, window_s = self.window.as_secs(), "Circuit opened");
                self.circuit = Circuit::Open { until: now + self.window };
            }
            Circuit::Open { .. } => {}
        }

        if let LlmError::RateLimited { retry_after_ms } = error {
            let wait = retry_after_ms
                .map(Duration::from_millis)
                .map_or(self.window, |hint| hint.min(self.window));
            self.throttled_until = Some(now + wait);
        }
    }

    /// Errors that say something about the provider rather than the request.
    ///
    /// Auth, invalid-request and context-length failures would repeat on any
    /// provider, so they are not counted.
    pub fn is_failover_error(error: &LlmError) -> bool {
        matches!(
            error,
            LlmError::Provider { .. }
                | LlmError::Stream(..)
                | LlmError::RateLimited { .. }
                | LlmError::Overloaded(..)
                | LlmError::EmptyResponse
        ) && !error.is_context_overflow()
    }

    pub fn status(&self) -> ProviderStatusInfo {
        ProviderStatusInfo {
            name: self.name.clone(),
            circuit_state: self.circuit.label().to_string(),
            last_error: self.last_error.clone(),
            total_calls: self.calls,
            total_failures: self.failures,
        }
    }
}
