//! LLM request/stream types for Ravel.
//!
//! These types model the provider boundary: the request handed to a provider,
//! the incremental events it streams back, usage accounting, and the errors a
//! provider can raise.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::tool::ToolSchema;

/// How the model may use the offered tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Tool { name: String },
}

/// Request to an LLM provider for one streamed model invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Reason why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    /// The model hit its own output cap.
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    Other,
    Unknown,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::ToolCalls => write!(f, "tool_calls"),
            FinishReason::ContentFilter => write!(f, "content_filter"),
            FinishReason::Error => write!(f, "error"),
            FinishReason::Other => write!(f, "other"),
            FinishReason::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for FinishReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "stop" => Ok(FinishReason::Stop),
            "length" => Ok(FinishReason::Length),
            "tool_calls" => Ok(FinishReason::ToolCalls),
            "content_filter" => Ok(FinishReason::ContentFilter),
            "error" => Ok(FinishReason::Error),
            "other" => Ok(FinishReason::Other),
            "unknown" => Ok(FinishReason::Unknown),
            other => Err(format!("invalid finish reason: '{other}'")),
        }
    }
}

/// Usage counters as reported by a provider; any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Resolved token usage for a model invocation (or a whole run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Accumulate another invocation's usage into this one.
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

impl From<StreamUsage> for Usage {
    fn from(raw: StreamUsage) -> Self {
        let prompt_tokens = raw.prompt_tokens.unwrap_or(0);
        let completion_tokens = raw.completion_tokens.unwrap_or(0);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: raw
                .total_tokens
                .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
        }
    }
}

/// Events emitted by a provider during a streamed model invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },

    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },

    /// A tool call has been announced; its argument buffer starts empty.
    ToolInputStart {
        id: String,
        tool_name: String,
    },

    /// A fragment of a tool call's raw argument text.
    ToolInputDelta {
        id: String,
        delta: String,
    },

    /// Terminal event for a tool call, carrying the authoritative input.
    ///
    /// `input` may be an object, a JSON-encoded string, empty, or absent.
    ToolCall {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
    },

    File {
        media_type: String,
        data: String,
    },

    Error {
        message: String,
    },

    /// The invocation has finished.
    Finish {
        finish_reason: FinishReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<StreamUsage>,
    },
}

/// Errors from LLM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("context length exceeded: max {max}, requested {requested}")]
    ContextLengthExceeded { max: u32, requested: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model returned an empty response")]
    EmptyResponse,
}

impl LlmError {
    /// Whether the failure looks like the prompt no longer fits the model's
    /// context window.
    pub fn is_context_overflow(&self) -> bool {
        if matches!(self, LlmError::ContextLengthExceeded { .. }) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        ["too long", "context length", "context_length", "maximum context", "overflow"]
            .iter()
            .any(|marker| text.contains(marker))
    }

    /// Whether re-sending the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LlmError::AuthenticationFailed | LlmError::InvalidRequest(_)
        )
    }
}

/// Configuration for a single named provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Registry name (e.g., "primary", "backup").
    pub name: String,
    /// Model identifier to request.
    #[serde(default)]
    pub model: Option<String>,
    /// Priority for fallback ordering; lower = higher priority.
    #[serde(default)]
    pub priority: u32,
    /// Whether this provider may be selected.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Status information for a provider in a fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatusInfo {
    pub name: String,
    /// One of "closed", "open", "half_open".
    pub circuit_state: String,
    pub last_error: Option<String>,
    pub total_calls: u64,
    pub total_failures: u64,
}
