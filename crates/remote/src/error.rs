//! Remote archive error types.

use thiserror::Error;
use uuid::Uuid;

/// Remote archive operation errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("remote job not found: {0}")]
    JobNotFound(String),

    #[error("remote product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("incomplete download: expected {expected} bytes, received {received}")]
    IncompleteDownload { expected: u64, received: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RemoteError> for hangar_storage::DataStoreError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::ProductNotFound(uuid) => Self::ProductNotFound(uuid),
            other => Self::Remote(other.to_string()),
        }
    }
}

/// Result type for remote archive operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;
