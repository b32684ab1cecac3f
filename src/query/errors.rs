//! Query error types
//!
//! Two families:
//! - Configuration errors (InvalidArgument, ConnectionClosed, NoRuntime) are
//!   returned synchronously, before any unit of work is opened.
//! - Store errors and aborted executions surface through the pending
//!   result handle.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while building or executing a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Malformed range descriptor or reserved name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection was closed before the call
    #[error("Connection '{0}' is closed")]
    ConnectionClosed(String),

    /// No async runtime to schedule work on
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// Backing store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Scheduled work stopped before producing a result
    #[error("Execution aborted: {0}")]
    Aborted(String),
}

impl QueryError {
    /// Stable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidArgument(_) => "CURSORDB_INVALID_ARGUMENT",
            QueryError::ConnectionClosed(_) => "CURSORDB_CONNECTION_CLOSED",
            QueryError::NoRuntime(_) => "CURSORDB_NO_RUNTIME",
            QueryError::Store(inner) => inner.code(),
            QueryError::Aborted(_) => "CURSORDB_ABORTED",
        }
    }

    /// Returns true for errors raised before any work was scheduled
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            QueryError::InvalidArgument(_) | QueryError::ConnectionClosed(_) | QueryError::NoRuntime(_)
        )
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        QueryError::InvalidArgument(reason.into())
    }

    /// The underlying store error, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            QueryError::Store(inner) => Some(inner),
            _ => None,
        }
    }
}
