//! Product model and checksum helpers.

use crate::error::{CoreError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A named checksum over product content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    /// Algorithm name, e.g. "SHA-256".
    pub algorithm: String,
    /// Lowercase hex digest.
    pub value: String,
}

impl Checksum {
    /// Compute a SHA-256 checksum over an in-memory buffer.
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self {
            algorithm: "SHA-256".to_string(),
            value: hex::encode(hasher.finalize()),
        }
    }

    /// Compute a SHA-256 checksum over a file, streaming in fixed-size reads.
    pub async fn sha256_file(path: impl AsRef<Path>) -> Result<Self> {
        use tokio::io::AsyncReadExt;

        let mut file = tokio::fs::File::open(path.as_ref()).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self {
            algorithm: "SHA-256".to_string(),
            value: hex::encode(hasher.finalize()),
        })
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Physical representation of a product's bytes.
///
/// Products are transient: constructed by a producer and consumed by at most
/// one in-flight consumer, so content handles are owned, not shared.
#[derive(Clone, Debug)]
pub enum ProductContent {
    /// Content lives in a local file.
    File(PathBuf),
    /// Content is held in memory.
    Bytes(Bytes),
}

impl ProductContent {
    /// Resolve the content length in bytes.
    pub async fn len(&self) -> Result<u64> {
        match self {
            Self::File(path) => Ok(tokio::fs::metadata(path).await?.len()),
            Self::Bytes(data) => Ok(data.len() as u64),
        }
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// A content-addressed remote-sensing product.
#[derive(Clone, Debug)]
pub struct Product {
    uuid: Uuid,
    name: String,
    size: u64,
    checksum: Option<Checksum>,
    content: ProductContent,
}

impl Product {
    /// Build a product from a local file, resolving its size from the
    /// filesystem. The product name defaults to the file name.
    pub async fn from_file(uuid: Uuid, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                CoreError::InvalidProduct(format!("path has no file name: {}", path.display()))
            })?;
        let size = tokio::fs::metadata(&path).await?.len();
        Ok(Self {
            uuid,
            name,
            size,
            checksum: None,
            content: ProductContent::File(path),
        })
    }

    /// Build a product from an in-memory buffer.
    pub fn from_bytes(uuid: Uuid, name: impl Into<String>, data: Bytes) -> Self {
        Self {
            uuid,
            name: name.into(),
            size: data.len() as u64,
            checksum: None,
            content: ProductContent::Bytes(data),
        }
    }

    /// Attach a checksum computed elsewhere.
    #[must_use]
    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn checksum(&self) -> Option<&Checksum> {
        self.checksum.as_ref()
    }

    pub fn content(&self) -> &ProductContent {
        &self.content
    }

    /// Consume the product, yielding its content handle.
    pub fn into_content(self) -> ProductContent {
        self.content
    }
}
