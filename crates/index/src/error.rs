//! Error types for the indexing store.

use thiserror::Error;

/// Errors surfaced by every indexing backend. Storage-engine errors are
/// wrapped into `DatabaseOps`/`DatabaseInit` and never leak engine types
/// across the contract.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("indexing context not initialized: {0}")]
    NotInitialized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database operation failed: {0}")]
    DatabaseOps(String),

    #[error("database initialization failed: {0}")]
    DatabaseInit(String),

    #[error("out of memory: {0}")]
    NoMemory(String),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

impl From<uridex_core::CoreError> for IndexError {
    fn from(err: uridex_core::CoreError) -> Self {
        IndexError::InvalidParameter(err.to_string())
    }
}

impl From<sqlx::Error> for IndexError {
    fn from(err: sqlx::Error) -> Self {
        IndexError::DatabaseOps(err.to_string())
    }
}

impl From<redb::TransactionError> for IndexError {
    fn from(err: redb::TransactionError) -> Self {
        IndexError::DatabaseOps(err.to_string())
    }
}

impl From<redb::TableError> for IndexError {
    fn from(err: redb::TableError) -> Self {
        IndexError::DatabaseOps(err.to_string())
    }
}

impl From<redb::StorageError> for IndexError {
    fn from(err: redb::StorageError) -> Self {
        IndexError::DatabaseOps(err.to_string())
    }
}

impl From<redb::CommitError> for IndexError {
    fn from(err: redb::CommitError) -> Self {
        IndexError::DatabaseOps(err.to_string())
    }
}
