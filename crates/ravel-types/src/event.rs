//! Observer event types for Ravel runs.
//!
//! `AgentEvent` is the unified progress notification emitted while a run is
//! streaming and executing tools. All variants are Clone + Send + Sync so they
//! can travel over tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::{FinishReason, Usage};
use crate::message::ToolOutput;

/// Identifies the run a notification belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub agent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl RunMeta {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            agent_name: agent_name.into(),
            task_id: None,
            node_id: None,
        }
    }
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Running text of a text stream. `done` is set exactly once, on close.
    Text {
        meta: RunMeta,
        stream_id: Uuid,
        text: String,
        done: bool,
    },

    /// Running text of a reasoning stream.
    Thinking {
        meta: RunMeta,
        stream_id: Uuid,
        text: String,
        done: bool,
    },

    /// Raw argument buffer of a tool call that is still streaming.
    ToolStreaming {
        meta: RunMeta,
        tool_call_id: String,
        tool_name: String,
        params_text: String,
    },

    /// A finalized tool call.
    ToolUse {
        meta: RunMeta,
        tool_call_id: String,
        tool_name: String,
        params: serde_json::Value,
    },

    /// The outcome of executing a tool call.
    ToolResult {
        meta: RunMeta,
        tool_call_id: String,
        tool_name: String,
        output: ToolOutput,
        is_error: bool,
    },

    File {
        meta: RunMeta,
        media_type: String,
        data: String,
    },

    /// A step failed for good (retries exhausted or non-retryable).
    Error { meta: RunMeta, error: String },

    Finish {
        meta: RunMeta,
        finish_reason: FinishReason,
        usage: Usage,
    },
}

impl AgentEvent {
    /// Stable snake_case name of the variant, matching the serde tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Text { .. } => "text",
            AgentEvent::Thinking { .. } => "thinking",
            AgentEvent::ToolStreaming { .. } => "tool_streaming",
            AgentEvent::ToolUse { .. } => "tool_use",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::File { .. } => "file",
            AgentEvent::Error { .. } => "error",
            AgentEvent::Finish { .. } => "finish",
        }
    }

    pub fn meta(&self) -> &RunMeta {
        match self {
            AgentEvent::Text { meta, .. }
            | AgentEvent::Thinking { meta, .. }
            | AgentEvent::ToolStreaming { meta, .. }
            | AgentEvent::ToolUse { meta, .. }
            | AgentEvent::ToolResult { meta, .. }
            | AgentEvent::File { meta, .. }
            | AgentEvent::Error { meta, .. }
            | AgentEvent::Finish { meta, .. } => meta,
        }
    }
}
