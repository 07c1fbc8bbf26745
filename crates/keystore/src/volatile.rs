//! In-memory, insertion-ordered key store.

use crate::entry::KeyStoreEntry;
use crate::error::KeyStoreResult;
use crate::traits::KeyStore;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Volatile key store: lost on restart.
///
/// Intended for backends that can re-derive physical locations
/// deterministically (e.g. object stores keyed by uuid), where durability
/// buys nothing.
#[derive(Default)]
pub struct VolatileKeyStore {
    entries: Mutex<IndexMap<(Uuid, String), KeyStoreEntry>>,
}

impl VolatileKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyStore for VolatileKeyStore {
    async fn put(&self, key: Uuid, tag: &str, value: &str) -> KeyStoreResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = KeyStoreEntry::new(key, tag, value);
        if let Some(previous) = entries.insert((key, tag.to_string()), entry) {
            tracing::warn!(
                key = %key,
                tag = tag,
                previous = %previous.value,
                "replacing existing key store entry"
            );
        }
        Ok(())
    }

    async fn get(&self, key: Uuid, tag: &str) -> KeyStoreResult<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(&(key, tag.to_string()))
            .map(|e| e.value.clone()))
    }

    async fn remove(&self, key: Uuid, tag: &str) -> KeyStoreResult<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        // shift_remove keeps insertion order intact for the age scan.
        Ok(entries
            .shift_remove(&(key, tag.to_string()))
            .map(|e| e.value))
    }

    async fn exists(&self, key: Uuid, tag: &str) -> KeyStoreResult<bool> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.contains_key(&(key, tag.to_string())))
    }

    async fn oldest_entries(&self, limit: usize) -> KeyStoreResult<Vec<KeyStoreEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.values().take(limit).cloned().collect())
    }

    async fn entries_by_uuid(&self, key: Uuid) -> KeyStoreResult<Vec<KeyStoreEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .values()
            .filter(|e| e.key == key)
            .cloned()
            .collect())
    }

    async fn unaltered_entries(
        &self,
        skip: usize,
        top: usize,
    ) -> KeyStoreResult<Vec<KeyStoreEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .values()
            .filter(|e| e.tag == crate::TAG_UNALTERED)
            .skip(skip)
            .take(top)
            .cloned()
            .collect())
    }
}
