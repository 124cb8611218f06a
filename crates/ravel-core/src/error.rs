use ravel_types::error::ToolError;
use ravel_types::llm::LlmError;
use thiserror::Error;

/// Errors that end an agent run or a single model step.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("run cancelled")]
    Cancelled,

    #[error("{consecutive} consecutive tool failures, last: {source}")]
    ToolFailure {
        consecutive: u32,
        #[source]
        source: ToolError,
    },

    #[error("provider '{0}' not registered")]
    ProviderNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether another attempt at the same step could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Llm(err) => err.is_retryable(),
            EngineError::Cancelled
            | EngineError::ToolFailure { .. }
            | EngineError::ProviderNotFound(_)
            | EngineError::Internal(_) => false,
        }
    }

    pub fn is_context_overflow(&self) -> bool {
        matches!(self, EngineError::Llm(err) if err.is_context_overflow())
    }
}
