//! # TDP Storage - SQLite Backend
//!
//! SQLite implementation of the storage backend. Each named database gets
//! its own file under the data directory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

use tdp_storage::{SqlParam, StorageBackend, StorageError};

/// SQLite storage backend.
///
/// The database lives at `{base_path}/{name}.db`.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteBackend {
    /// Opens or creates a SQLite database.
    ///
    /// # Arguments
    ///
    /// * `base_path` - Directory where database files are stored
    /// * `name` - Database name (must match `[a-z0-9_-]+`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Database name is invalid
    /// - Directory cannot be created
    /// - Database connection fails
    pub async fn open(base_path: impl AsRef<Path>, name: &str) -> Result<Self, StorageError> {
        Self::validate_name(name)?;

        let base = base_path.as_ref();
        std::fs::create_dir_all(base).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
        })?;

        let db_path = base.join(format!("{name}.db"));
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!(database = %name, path = %db_path.display(), "Opening SQLite database");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!(database = %name, "SQLite backend ready");

        Ok(Self { pool, db_path })
    }

    /// Validates that a database name is safe to use as a file name.
    ///
    /// Only allows: lowercase letters, digits, underscore, hyphen.
    fn validate_name(name: &str) -> Result<(), StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidInput(
                "database name cannot be empty".into(),
            ));
        }

        if name.len() > 64 {
            return Err(StorageError::InvalidInput("database name too long".into()));
        }

        let valid = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if !valid {
            return Err(StorageError::InvalidInput(
                "database name must match [a-z0-9_-]+".into(),
            ));
        }

        Ok(())
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Queries a single row with typed results.
    pub async fn query_one<T>(&self, sql: &str, params: &[SqlParam]) -> Result<Option<T>, StorageError>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut query = sqlx::query_as::<_, T>(sql);
        for param in params {
            query = bind_as(query, param);
        }
        query
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    /// Queries multiple rows with typed results.
    pub async fn query_all<T>(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<T>, StorageError>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut query = sqlx::query_as::<_, T>(sql);
        for param in params {
            query = bind_as(query, param);
        }
        query.fetch_all(&self.pool).await.map_err(map_sqlx_error)
    }

    /// Starts a transaction.
    ///
    /// The transaction rolls back when dropped without [`SqliteTransaction::commit`].
    pub async fn begin(&self) -> Result<SqliteTransaction, StorageError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(SqliteTransaction { tx })
    }
}

/// An open transaction on a [`SqliteBackend`].
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteTransaction {
    /// Executes a statement inside the transaction, returning affected rows.
    pub async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, StorageError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind(query, param);
        }
        let result = query.execute(&mut *self.tx).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    /// Queries a single row inside the transaction.
    pub async fn query_one<T>(&mut self, sql: &str, params: &[SqlParam]) -> Result<Option<T>, StorageError>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut query = sqlx::query_as::<_, T>(sql);
        for param in params {
            query = bind_as(query, param);
        }
        query
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)
    }

    /// Commits the transaction.
    pub async fn commit(self) -> Result<(), StorageError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn execute_raw(&self, sql: &str) -> Result<(), StorageError> {
        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement.trim())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, StorageError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind(query, param);
        }
        let result = query.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

fn bind<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &SqlParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Integer(v) => query.bind(*v),
        SqlParam::Text(v) => query.bind(v.clone()),
    }
}

fn bind_as<'q, T>(
    query: sqlx::query::QueryAs<'q, Sqlite, T, SqliteArguments<'q>>,
    param: &SqlParam,
) -> sqlx::query::QueryAs<'q, Sqlite, T, SqliteArguments<'q>> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Integer(v) => query.bind(*v),
        SqlParam::Text(v) => query.bind(v.clone()),
    }
}

fn map_sqlx_error(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::AlreadyExists(db.message().to_string())
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StorageError::InvalidInput(e.to_string())
        },
        other => StorageError::QueryFailed(other.to_string()),
    }
}
