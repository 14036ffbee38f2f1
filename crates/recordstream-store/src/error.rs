//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during sink and cursor operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Call made out of order, e.g. storing a record with no file open.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The sink refused the write.
    #[error("rejected: {0}")]
    Rejected(String),

    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
