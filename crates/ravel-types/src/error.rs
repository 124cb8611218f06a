use thiserror::Error;

/// Errors raised by tools and tool discovery.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{0}' not found")]
    NotFound(String),

    #[error("invalid input for tool '{tool}': {message}")]
    InvalidInput { tool: String, message: String },

    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },

    #[error("tool discovery failed: {0}")]
    Discovery(String),
}

/// Errors from repository operations (used by trait definitions in ravel-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::NotFound("weather".to_string());
        assert_eq!(err.to_string(), "tool 'weather' not found");

        let err = ToolError::InvalidInput {
            tool: "weather".to_string(),
            message: "missing city".to_string(),
        };
        assert!(err.to_string().contains("missing city"));
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Serialization("eof".to_string());
        assert_eq!(err.to_string(), "serialization error: eof");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Parse("expected '='".to_string());
        assert!(err.to_string().starts_with("failed to parse config"));
    }
}
