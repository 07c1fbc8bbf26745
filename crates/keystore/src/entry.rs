//! Key store entry model.

use time::OffsetDateTime;
use uuid::Uuid;

/// One (key, tag) → value mapping with its insertion timestamp.
///
/// `(key, tag)` is the composite identity within one key store instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyStoreEntry {
    /// Product identity.
    pub key: Uuid,
    /// Category of the reference, e.g. "unaltered".
    pub tag: String,
    /// Opaque physical reference (path, object key, remote handle).
    pub value: String,
    pub created_at: OffsetDateTime,
}

impl KeyStoreEntry {
    pub fn new(key: Uuid, tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key,
            tag: tag.into(),
            value: value.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
