//! User directory error types.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Per-field validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Creates an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message against a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Messages recorded for a field.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Whether no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts into a `Result`, failing when any error was recorded.
    pub fn into_result(self) -> Result<(), UsersError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(UsersError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Errors that can occur in the user directory.
#[derive(Debug, Error)]
pub enum UsersError {
    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Username already taken.
    #[error("user already exists: {0}")]
    AlreadyExists(String),

    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Unknown role name.
    #[error("\"{0}\" is not a valid choice.")]
    InvalidRole(String),

    /// Population refused because target tables are not empty.
    #[error("Database must be empty of regions or STTs to run this command.")]
    NotEmpty,

    /// Bundled population data is malformed.
    #[error("invalid population data: {0}")]
    Data(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Cryptographic error.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl From<tdp_storage::StorageError> for UsersError {
    fn from(e: tdp_storage::StorageError) -> Self {
        match e {
            tdp_storage::StorageError::AlreadyExists(msg) => UsersError::AlreadyExists(msg),
            other => UsersError::Storage(other.to_string()),
        }
    }
}

impl From<tdp_crypto::CryptoError> for UsersError {
    fn from(e: tdp_crypto::CryptoError) -> Self {
        UsersError::Crypto(e.to_string())
    }
}
