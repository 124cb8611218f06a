//! Prompt construction for the planning phase.
//!
//! The system prompt is assembled from XML-tagged sections so the model can
//! tell identity, instructions and environment apart:
//!
//! ```text
//! <identity>You are {name}. {description}</identity>
//! <environment>Current date: {date}</environment>
//! <instructions>{instructions}</instructions>
//! ```
//!
//! The task is wrapped in `<task>` tags as the first user message.

use chrono::{DateTime, Utc};

use ravel_types::config::AgentConfig;

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn system_prompt(config: &AgentConfig, now: DateTime<Utc>) -> String {
        let mut sections = Vec::with_capacity(3);

        let description = config.description.trim();
        if description.is_empty() {
            sections.push(format!("<identity>\nYou are {}.\n</identity>", config.name));
        } else {
            sections.push(format!(
                "<identity>\nYou are {}. {description}\n</identity>",
                config.name
            ));
        }

        sections.push(format!(
            "<environment>\nCurrent date: {}\n</environment>",
            now.format("%Y-%m-%d")
        ));

        if let Some(instructions) = config
            .instructions
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            sections.push(format!("<instructions>\n{instructions}\n</instructions>"));
        }

        sections.join("\n\n")
    }

    pub fn task_prompt(task: &str) -> String {
        format!("<task>\n{}\n</task>", task.trim())
    }
}
