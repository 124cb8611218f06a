//! Provider registry for runtime provider lookup.

use std::collections::HashMap;
use std::sync::Arc;

use ravel_types::llm::ProviderConfig;

use super::fallback::FallbackChain;
use super::provider::LlmProvider;
use crate::error::EngineError;

/// Registry of available LLM providers, indexed by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under the given name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn list_names(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }

    /// Resolve an agent's ordered provider list into a single provider.
    ///
    /// With explicit `names`, list position is the priority. Without, every
    /// enabled configured provider is used in config priority order. Disabled
    /// providers are skipped either way. One survivor is returned as is; more
    /// than one become a [`FallbackChain`].
    pub fn resolve(
        &self,
        names: &[String],
        configs: &[ProviderConfig],
    ) -> Result<Arc<dyn LlmProvider>, EngineError> {
        let enabled = |name: &str| {
            configs
                .iter()
                .find(|c| c.name == name)
                .is_none_or(|c| c.enabled)
        };

        let mut selected: Vec<(u32, String)> = if names.is_empty() {
            configs
                .iter()
                .filter(|c| c.enabled)
                .map(|c| (c.priority, c.name.clone()))
                .collect()
        } else {
            names
                .iter()
                .enumerate()
                .filter(|(_, name)| enabled(name))
                .map(|(idx, name)| (idx as u32, name.clone()))
                .collect()
        };
        selected.sort();

        let mut chain = Vec::with_capacity(selected.len());
        for (priority, name) in selected {
            let provider = self
                .get(&name)
                .ok_or_else(|| EngineError::ProviderNotFound(name.clone()))?;
            chain.push((priority, provider));
        }

        match chain.len() {
            0 => Err(EngineError::ProviderNotFound(
                names.first().cloned().unwrap_or_else(|| "<none>".to_string()),
            )),
            1 => Ok(chain.remove(0).1),
            _ => Ok(Arc::new(FallbackChain::new(chain))),
        }
    }
}
