//! Ingestion error types.

use thiserror::Error;

/// Ingestion pipeline errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("product error: {0}")]
    Product(#[from] hangar_core::CoreError),

    #[error("store error: {0}")]
    Store(#[from] hangar_storage::DataStoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ingestion operations.
pub type IngestResult<T> = std::result::Result<T, IngestError>;
