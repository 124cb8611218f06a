//! Tool schema and result types.

use serde::{Deserialize, Serialize};

use crate::message::{ContentPart, OutputSegment, ToolOutput};

/// Tool definition handed to the model: name, description and JSON Schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Outcome of executing a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub is_error: bool,
    /// Structured payload, preferred over `content` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::text(text)],
            is_error: false,
            structured: None,
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self {
            content: Vec::new(),
            is_error: false,
            structured: Some(value),
        }
    }

    /// A failed call. The text is prefixed with `Error:` unless it already is.
    pub fn error(text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.starts_with("Error:") {
            text
        } else {
            format!("Error: {text}")
        };
        Self {
            content: vec![ContentPart::text(text)],
            is_error: true,
            structured: None,
        }
    }

    /// Convert into the output carried by a tool-result message part.
    pub fn into_output(self) -> ToolOutput {
        if self.is_error {
            let text = collect_text(&self.content);
            return ToolOutput::ErrorText(if text.starts_with("Error:") {
                text
            } else {
                format!("Error: {text}")
            });
        }
        if let Some(value) = self.structured {
            return ToolOutput::Json(value);
        }

        let has_media = self
            .content
            .iter()
            .any(|part| matches!(part, ContentPart::File { .. }));
        if !has_media {
            return ToolOutput::Text(collect_text(&self.content));
        }

        let segments = self
            .content
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(OutputSegment::Text { text }),
                ContentPart::File { media_type, data } => {
                    Some(OutputSegment::Media { media_type, data })
                }
                _ => None,
            })
            .collect();
        ToolOutput::Content(segments)
    }
}

fn collect_text(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
