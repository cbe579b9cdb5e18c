//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashingFailed(String),

    /// A stored password hash could not be parsed.
    #[error("invalid password hash: {0}")]
    InvalidHash(String),

    /// Invalid input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
