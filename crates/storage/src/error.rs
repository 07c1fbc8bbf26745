//! DataStore error types.

use hangar_core::Order;
use thiserror::Error;
use uuid::Uuid;

/// DataStore operation errors.
#[derive(Debug, Error)]
pub enum DataStoreError {
    #[error("product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("data store name unavailable: {0}")]
    NameUnavailable(String),

    #[error("data store {0} is read-only")]
    ReadOnly(String),

    #[error("data store {store} does not support {operation}")]
    Unsupported {
        store: String,
        operation: &'static str,
    },

    #[error("insufficient space on {store}: need {needed} bytes, {available} available")]
    InsufficientSpace {
        store: String,
        needed: u64,
        available: u64,
    },

    #[error("request capacity exceeded on {0}")]
    CapacityExceeded(String),

    #[error("no writable data store accepted product {0}")]
    NoStoreAvailable(Uuid),

    #[error("{0}")]
    OrderInProgress(Box<Order>),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key store error: {0}")]
    KeyStore(#[from] hangar_keystore::KeyStoreError),

    #[error("object storage error: {0}")]
    Object(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("remote archive error: {0}")]
    Remote(String),
}

/// Result type for data store operations.
pub type DataStoreResult<T> = std::result::Result<T, DataStoreError>;
