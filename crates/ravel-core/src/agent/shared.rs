//! Key-value state shared between concurrent runs.
//!
//! A `SharedContext` is the only thing independent runs share, and only when
//! the caller hands the same context to each of them. Backed by `DashMap`;
//! reads clone the value out so no shard guard outlives the call.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// Concurrent key-value store. Clones are views of the same map.
///
/// Writes are last-writer-wins. Use [`update`](Self::update) when a write
/// depends on the current value.
#[derive(Debug, Clone, Default)]
pub struct SharedContext {
    entries: Arc<DashMap<String, Value>>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Store `value`, returning what it replaced.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Read-modify-write under the key's shard lock.
    ///
    /// `f` receives the current value (`None` if absent or null) and returns the new
    /// one. `f` must not touch this context.
    pub fn update<F>(&self, key: impl Into<String>, f: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let key = key.into();
        let mut entry = self.entries.entry(key).or_insert(Value::Null);
        let current = (!entry.is_null()).then_some(&*entry);
        let next = f(current);
        *entry = next.clone();
        next
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
