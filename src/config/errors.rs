//! Configuration error types

use std::io;

use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating a database configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// File is not valid JSON for the expected shape
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Content parsed but is inconsistent
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "CURSORDB_CONFIG_READ",
            ConfigError::Parse(_) => "CURSORDB_CONFIG_PARSE",
            ConfigError::Invalid(_) => "CURSORDB_CONFIG_INVALID",
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::Invalid(reason.into())
    }
}
