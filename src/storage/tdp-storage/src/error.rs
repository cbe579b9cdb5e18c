//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entry not found.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Entry already exists (unique constraint violated).
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// Connection or migration failure.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failure.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not be started or committed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Invalid input (bad database name, malformed row, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
