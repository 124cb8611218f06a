//! Multi-provider fallback chain.
//!
//! Routes each streamed invocation to the highest-priority provider whose
//! circuit is not open. Mid-stream failover is not possible: once a stream
//! starts, its errors go to the caller (the retry policy), and the outcome is
//! recorded against that provider so the next attempt can route elsewhere.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::StreamExt;

use ravel_types::llm::{LlmError, LlmRequest, ProviderStatusInfo, StreamEvent};

use super::health::ProviderHealth;
use super::provider::{LlmProvider, LlmStream, error_stream};

/// Priority-ordered set of providers sharing one request interface.
pub struct FallbackChain {
    name: String,
    providers: Vec<Arc<dyn LlmProvider>>,
    /// Parallel to `providers`. Shared with in-flight streams so they can
    /// report their outcome after `stream()` has returned.
    health: Arc<Mutex<Vec<ProviderHealth>>>,
}

impl FallbackChain {
    /// Build a chain from `(priority, provider)` pairs.
    pub fn new(providers: Vec<(u32, Arc<dyn LlmProvider>)>) -> Self {
        let health = providers
            .iter()
            .map(|(priority, provider)| ProviderHealth::new(provider.name(), *priority))
            .collect();
        let name = providers
            .iter()
            .map(|(_, p)| p.name())
            .collect::<Vec<_>>()
            .join("|");

        Self {
            name,
            providers: providers.into_iter().map(|(_, p)| p).collect(),
            health: Arc::new(Mutex::new(health)),
        }
    }

    /// Health status of every provider, in registration order.
    pub fn health_status(&self) -> Vec<ProviderStatusInfo> {
        lock(&self.health)
            .iter()
            .map(ProviderHealth::status)
            .collect()
    }

    /// Indices sorted by priority, ties broken by name.
    fn sorted_indices(health: &[ProviderHealth]) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..health.len()).collect();
        indices.sort_by(|&a, &b| {
            health[a]
                .priority
                .cmp(&health[b].priority)
                .then_with(|| health[a].name.cmp(&health[b].name))
        });
        indices
    }

    /// Pick the first available provider, moving open circuits to half-open
    /// where their window has passed.
    fn select(&self) -> Option<usize> {
        let now = Instant::now();
        let mut health = lock(&self.health);
        let order = Self::sorted_indices(&health);
        let primary = order.first().copied();
        let selected = order.into_iter().find(|&idx| health[idx].admits(now));

        if let (Some(selected), Some(primary)) = (selected, primary) {
            if selected != primary {
                tracing::warn!(
                    from = %health[primary].name,
                    to = %health[selected].name,
                    "Provider failover"
                );
            }
        }
        selected
    }
}

impl LlmProvider for FallbackChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream(&self, request: LlmRequest) -> LlmStream {
        let Some(idx) = self.select() else {
            return error_stream(LlmError::Provider {
                message: "all providers in fallback chain are unavailable".to_string(),
            });
        };

        let provider = &self.providers[idx];
        tracing::debug!(provider = %provider.name(), "Routing stream");
        let mut inner = provider.stream(request);
        let health = Arc::clone(&self.health);

        Box::pin(async_stream::stream! {
            while let Some(item) = inner.next().await {
                let in_stream;
                let failure = match &item {
                    Ok(StreamEvent::Finish { .. }) => {
                        lock(&health)[idx].record_success();
                        None
                    }
                    Ok(StreamEvent::Error { message }) => {
                        in_stream = LlmError::Provider {
                            message: message.clone(),
                        };
                        Some(&in_stream)
                    }
                    Err(err) => Some(err),
                    Ok(_) => None,
                };
                if let Some(err) = failure.filter(|err| ProviderHealth::is_failover_error(err)) {
                    lock(&health)[idx].record_failure(err);
                }
                yield item;
            }
        })
    }
}

fn lock(health: &Mutex<Vec<ProviderHealth>>) -> MutexGuard<'_, Vec<ProviderHealth>> {
    health.lock().unwrap_or_else(PoisonError::into_inner)
}
