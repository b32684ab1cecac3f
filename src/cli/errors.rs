//! CLI-specific error types
//!
//! Every CLI error is fatal: it is reported and the process exits with 1.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::query::QueryError;

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Request could not be built or executed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Request is well-formed JSON but asks for an impossible chain
    #[error("Invalid request: {0}")]
    Request(String),

    /// stdin/stdout failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Request or response JSON failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn request(reason: impl Into<String>) -> Self {
        CliError::Request(reason.into())
    }

    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(e) => e.code(),
            CliError::Query(e) => e.code(),
            CliError::Request(_) => "CURSORDB_CLI_REQUEST",
            CliError::Io(_) => "CURSORDB_CLI_IO",
            CliError::Json(_) => "CURSORDB_CLI_JSON",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_codes_pass_through() {
        let err: CliError = QueryError::Store(StoreError::Constraint("dup".into())).into();
        assert_eq!(err.code(), "CURSORDB_CONSTRAINT");
        assert_eq!(CliError::request("x").code(), "CURSORDB_CLI_REQUEST");
    }
}
