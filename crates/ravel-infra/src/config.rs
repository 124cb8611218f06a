//! Engine configuration loader.
//!
//! Reads `ravel.toml` into [`EngineConfig`]. A missing file means defaults;
//! a file that exists must parse and validate.

use std::path::Path;

use ravel_types::config::EngineConfig;
use ravel_types::error::ConfigError;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "ravel.toml";

/// Load and validate the engine configuration at `path`.
///
/// - Missing file: [`EngineConfig::default()`].
/// - Unreadable file: [`ConfigError::Io`].
/// - Malformed TOML or wrong field types: [`ConfigError::Parse`].
/// - Values the engine cannot run with: [`ConfigError::Invalid`].
pub async fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return Ok(EngineConfig::default());
        }
        Err(err) => return Err(ConfigError::Io(format!("{}: {err}", path.display()))),
    };

    let config = parse_engine_config(&content)?;
    tracing::debug!(
        path = %path.display(),
        agent = %config.agent.name,
        providers = config.providers.len(),
        "Loaded engine config"
    );
    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_engine_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(&tmp.path().join(CONFIG_FILE_NAME))
            .await
            .unwrap();
        assert_eq!(config.agent.name, "assistant");
        assert_eq!(config.agent.max_steps, 100);
        assert_eq!(config.memory.max_messages, 15);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.providers.is_empty());
    }

    #[tokio::test]
    async fn full_file_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(
            &path,
            r#"
[agent]
name = "researcher"
description = "Finds sources."
max_steps = 20
providers = ["primary", "backup"]

[memory]
max_messages = 30

[retry]
max_retries = 5
base_delay_ms = 50

[[providers]]
name = "primary"
model = "large"

[[providers]]
name = "backup"
priority = 1
enabled = false
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(&path).await.unwrap();
        assert_eq!(config.agent.name, "researcher");
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.agent.max_consecutive_tool_errors, 10);
        assert_eq!(config.memory.max_messages, 30);
        assert_eq!(config.memory.max_tokens, 16000);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 50);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].model.as_deref(), Some("large"));
        assert!(!config.providers[1].enabled);
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let err = load_engine_config(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_step_budget_is_rejected() {
        let err = parse_engine_config("[agent]\nmax_steps = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn unknown_provider_reference_is_rejected() {
        let err = parse_engine_config("[agent]\nproviders = [\"ghost\"]\n").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn directory_path_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_engine_config(tmp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
