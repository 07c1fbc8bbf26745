//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid product: {0}")]
    InvalidProduct(String),

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
