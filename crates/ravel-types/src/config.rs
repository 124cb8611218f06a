//! Engine configuration types.
//!
//! `EngineConfig` represents the top-level `ravel.toml` that controls the
//! agent's step budget, memory limits, retry behavior, and provider list.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::ProviderConfig;

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl EngineConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::Invalid("agent.max_steps must be at least 1".into()));
        }
        if self.memory.max_messages == 0 {
            return Err(ConfigError::Invalid(
                "memory.max_messages must be at least 1".into(),
            ));
        }
        if self.memory.compression_max_length == 0 {
            return Err(ConfigError::Invalid(
                "memory.compression_max_length must be at least 1".into(),
            ));
        }
        for name in &self.agent.providers {
            if !self.providers.iter().any(|p| &p.name == name) {
                return Err(ConfigError::Invalid(format!(
                    "agent.providers references unknown provider '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// Agent identity and loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Extra system-prompt instructions appended after the preamble.
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_max_consecutive_tool_errors")]
    pub max_consecutive_tool_errors: u32,
    /// Ordered provider names; more than one enables failover.
    #[serde(default)]
    pub providers: Vec<String>,
}

fn default_agent_name() -> String {
    "assistant".to_string()
}

fn default_max_steps() -> u32 {
    100
}

fn default_max_consecutive_tool_errors() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            description: String::new(),
            instructions: None,
            max_steps: default_max_steps(),
            max_consecutive_tool_errors: default_max_consecutive_tool_errors(),
            providers: Vec::new(),
        }
    }
}

/// Conversation memory limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Characters kept per text part when compressing.
    #[serde(default = "default_compression_max_length")]
    pub compression_max_length: usize,
}

fn default_max_messages() -> usize {
    15
}

fn default_max_tokens() -> usize {
    16_000
}

fn default_compression_max_length() -> usize {
    4000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            max_tokens: default_max_tokens(),
            compression_max_length: default_compression_max_length(),
        }
    }
}

/// Retry and recovery settings for model invocations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_enable_compression")]
    pub enable_compression: bool,
    #[serde(default = "default_compress_message_threshold")]
    pub compress_message_threshold: usize,
    #[serde(default = "default_compress_token_threshold")]
    pub compress_token_threshold: usize,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_enable_compression() -> bool {
    true
}

fn default_compress_message_threshold() -> usize {
    10
}

fn default_compress_token_threshold() -> usize {
    12_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            enable_compression: default_enable_compression(),
            compress_message_threshold: default_compress_message_threshold(),
            compress_token_threshold: default_compress_token_threshold(),
        }
    }
}
