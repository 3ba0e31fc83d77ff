//! Error types for the SQLite storage crate.

use kds_core::HistoryError;
use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by the SQLite storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Query or statement failure
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Could not open a connection to the database file
    #[error("Connection error: {0}")]
    Connection(#[from] diesel::ConnectionError),

    /// Could not obtain a pooled connection
    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// Applying embedded migrations failed
    #[error("Migration error: {0}")]
    Migration(String),

    /// Filesystem error preparing the database directory
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for HistoryError {
    fn from(err: StorageError) -> Self {
        HistoryError::storage(err.to_string())
    }
}
