//! Storage backend trait definition.

use async_trait::async_trait;

use crate::{SqlParam, StorageError};

/// Storage backend trait for implementing different SQL engines.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Executes one or more `;`-separated statements without parameters.
    async fn execute_raw(&self, sql: &str) -> Result<(), StorageError>;

    /// Executes a single statement and returns the number of affected rows.
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, StorageError>;

    /// Checks that the database answers.
    async fn ping(&self) -> Result<(), StorageError>;
}
