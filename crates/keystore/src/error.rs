//! Key store error types.

use thiserror::Error;

/// Key store operation errors.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("entry not found: ({key}, {tag})")]
    NotFound { key: uuid::Uuid, tag: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}

/// Result type for key store operations.
pub type KeyStoreResult<T> = std::result::Result<T, KeyStoreError>;
