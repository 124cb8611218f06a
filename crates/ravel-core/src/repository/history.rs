//! Conversation history repository trait.
//!
//! Persists the bounded message window of a run so a later run can resume
//! from it (see `AgentEngine::run_with_history`). The infrastructure layer
//! (ravel-infra) implements this with JSON files.

use ravel_types::error::RepositoryError;
use ravel_types::message::Message;

/// Storage for conversation histories, keyed by a caller-chosen name.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait HistoryStore: Send + Sync {
    /// Load a history. `Ok(None)` when nothing was saved under `key`.
    fn load(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<Message>>, RepositoryError>> + Send;

    /// Save a history, replacing any previous one under `key`.
    fn save(
        &self,
        key: &str,
        messages: &[Message],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a history. Returns `true` if one existed.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
