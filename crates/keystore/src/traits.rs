//! Key store trait definition.

use crate::entry::KeyStoreEntry;
use crate::error::KeyStoreResult;
use async_trait::async_trait;
use uuid::Uuid;

/// A mapping from (product uuid, tag) to an opaque physical reference.
///
/// Overwriting an existing (key, tag) updates in place; implementations log
/// a warning since a silent replace usually indicates duplicate ingestion.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Insert or overwrite a mapping.
    async fn put(&self, key: Uuid, tag: &str, value: &str) -> KeyStoreResult<()>;

    /// Look up a mapping.
    async fn get(&self, key: Uuid, tag: &str) -> KeyStoreResult<Option<String>>;

    /// Remove a mapping, returning the previous value if present.
    async fn remove(&self, key: Uuid, tag: &str) -> KeyStoreResult<Option<String>>;

    /// Whether a mapping exists.
    async fn exists(&self, key: Uuid, tag: &str) -> KeyStoreResult<bool>;

    /// Entries ordered oldest insertion first, capped at `limit`.
    ///
    /// Callers page through repeated calls after deleting victims; this is
    /// the scan backing eviction.
    async fn oldest_entries(&self, limit: usize) -> KeyStoreResult<Vec<KeyStoreEntry>>;

    /// All entries recorded for one product.
    async fn entries_by_uuid(&self, key: Uuid) -> KeyStoreResult<Vec<KeyStoreEntry>>;

    /// Entries carrying the "unaltered" tag, paginated with skip/top.
    async fn unaltered_entries(&self, skip: usize, top: usize)
        -> KeyStoreResult<Vec<KeyStoreEntry>>;
}
