//! Backing store error types
//!
//! Every failure the store can report while a unit of work is open.
//! These always reach callers asynchronously, through the rejection path
//! of a pending result.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the backing store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Named database, table or index does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A write violated a key or unique-index constraint
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A value could not be used as a key, or a record has the wrong shape
    #[error("Data error: {0}")]
    Data(String),

    /// A write was attempted through a read-only transaction
    #[error("Transaction is read-only: {0}")]
    ReadOnly(String),

    /// Requested version is lower than the stored one
    #[error("Version error: requested {requested}, stored {stored}")]
    Version { requested: u64, stored: u64 },

    /// Operation blocked by an open connection
    #[error("Blocked: {0}")]
    Blocked(String),

    /// Transaction aborted before completion
    #[error("Transaction aborted: {0}")]
    Aborted(String),

    /// Lock poisoned by a panicking writer
    #[error("Store state poisoned")]
    Poisoned,
}

impl StoreError {
    /// Stable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "CURSORDB_NOT_FOUND",
            StoreError::Constraint(_) => "CURSORDB_CONSTRAINT",
            StoreError::Data(_) => "CURSORDB_DATA",
            StoreError::ReadOnly(_) => "CURSORDB_READ_ONLY",
            StoreError::Version { .. } => "CURSORDB_VERSION",
            StoreError::Blocked(_) => "CURSORDB_BLOCKED",
            StoreError::Aborted(_) => "CURSORDB_ABORTED",
            StoreError::Poisoned => "CURSORDB_POISONED",
        }
    }

    /// Create a not-found error for a table
    pub fn table_not_found(table: &str) -> Self {
        StoreError::NotFound(format!("table '{}'", table))
    }

    /// Create a not-found error for an index
    pub fn index_not_found(table: &str, index: &str) -> Self {
        StoreError::NotFound(format!("index '{}' on table '{}'", index, table))
    }

    /// Returns true for constraint violations
    pub fn is_constraint(&self) -> bool {
        matches!(self, StoreError::Constraint(_))
    }

    /// Returns true for data errors
    pub fn is_data(&self) -> bool {
        matches!(self, StoreError::Data(_))
    }
}
