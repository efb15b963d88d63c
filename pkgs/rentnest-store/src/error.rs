//! Error types for the key/value store.

use thiserror::Error;

/// A type alias for `Result<T, StorageError>`.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Failures raised by a [`KeyValueStore`](crate::KeyValueStore) backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The underlying database rejected a query.
    #[error("Database error: {0}")]
    Database(String),

    /// Schema migration failed while opening the store.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The store cannot serve the request right now (closed, injected fault, ...).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sea_orm::DbErr> for StorageError {
    fn from(e: sea_orm::DbErr) -> Self {
        StorageError::Database(e.to_string())
    }
}
