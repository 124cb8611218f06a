//! Conversation message types.
//!
//! A [`Message`] is one turn of the running conversation. Its content is an
//! ordered list of [`ContentPart`]s so a single assistant turn can carry text,
//! reasoning, and tool calls together, and a single tool turn can carry the
//! results for every call the preceding assistant turn issued.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// One segment of a mixed tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputSegment {
    Text { text: String },
    Media { media_type: String, data: String },
}

/// Output carried by a tool-result part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    /// Plain text result.
    Text(String),
    /// The call failed; the text describes why.
    ErrorText(String),
    /// Structured result.
    Json(serde_json::Value),
    /// Mixed text and media segments.
    Content(Vec<OutputSegment>),
}

impl ToolOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::ErrorText(_))
    }

    /// Flatten the output to text (media segments become a short marker).
    pub fn to_text(&self) -> String {
        match self {
            ToolOutput::Text(text) | ToolOutput::ErrorText(text) => text.clone(),
            ToolOutput::Json(value) => value.to_string(),
            ToolOutput::Content(segments) => segments
                .iter()
                .map(|segment| match segment {
                    OutputSegment::Text { text } => text.clone(),
                    OutputSegment::Media { media_type, .. } => format!("[{media_type}]"),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A single piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Model "thinking" trace.
    Reasoning {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        /// Always a JSON object once assembly has finished.
        input: serde_json::Value,
        /// Set when the raw argument text could not be parsed into an object.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_error: Option<String>,
    },
    ToolResult {
        id: String,
        name: String,
        output: ToolOutput,
    },
    File {
        media_type: String,
        data: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        ContentPart::ToolCall {
            id: id.into(),
            name: name.into(),
            input,
            input_error: None,
        }
    }

    pub fn tool_result(id: impl Into<String>, name: impl Into<String>, output: ToolOutput) -> Self {
        ContentPart::ToolResult {
            id: id.into(),
            name: name.into(),
            output,
        }
    }

    /// The call id for tool-call parts.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            ContentPart::ToolCall { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The call id for tool-result parts.
    pub fn tool_result_id(&self) -> Option<&str> {
        match self {
            ContentPart::ToolResult { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: Vec<ContentPart>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentPart::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(text)])
    }

    pub fn assistant(parts: Vec<ContentPart>) -> Self {
        Self::new(Role::Assistant, parts)
    }

    pub fn tool(results: Vec<ContentPart>) -> Self {
        Self::new(Role::Tool, results)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Ids of every tool call issued by this message, in order.
    pub fn tool_call_ids(&self) -> Vec<&str> {
        self.content.iter().filter_map(ContentPart::tool_call_id).collect()
    }

    /// Ids of every tool result carried by this message, in order.
    pub fn tool_result_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(ContentPart::tool_result_id)
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|part| matches!(part, ContentPart::ToolCall { .. }))
    }

    /// Concatenated text parts (reasoning excluded).
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
