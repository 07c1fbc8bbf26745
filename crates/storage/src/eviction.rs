//! Oldest-first eviction.

use crate::error::DataStoreResult;
use crate::traits::DataStore;
use hangar_core::{EventBus, EvictionConf, ProductEvent};
use hangar_keystore::KeyStore;
use std::collections::HashSet;
use tracing::instrument;

/// Batch size for the keystore age scan.
const SCAN_BATCH: usize = 64;

/// Evict oldest products from `store` until at least `bytes_needed` bytes
/// have been freed, bounded by `max_evicted` victims per pass.
///
/// Returns the number of bytes actually freed, which may fall short when
/// the store runs out of evictable entries. Victims are announced on the
/// event bus so external caches and indexes can invalidate.
#[instrument(skip(store, keystore, events), fields(store = store.name()))]
pub async fn free_space(
    store: &dyn DataStore,
    keystore: &dyn KeyStore,
    bytes_needed: u64,
    max_evicted: usize,
    events: Option<&EventBus>,
) -> DataStoreResult<u64> {
    let mut freed = 0u64;
    let mut evicted = 0usize;
    let mut seen = HashSet::new();

    while freed < bytes_needed && evicted < max_evicted {
        let batch = keystore.oldest_entries(SCAN_BATCH).await?;
        // Entries may repeat per product (one row per tag); evict by
        // distinct uuid, oldest first.
        let victims: Vec<_> = batch
            .iter()
            .map(|e| e.key)
            .filter(|uuid| seen.insert(*uuid))
            .collect();
        if victims.is_empty() {
            break;
        }

        for uuid in victims {
            if freed >= bytes_needed || evicted >= max_evicted {
                break;
            }
            let size = match store.get(uuid).await {
                Ok(product) => product.size(),
                // Entry without retrievable content still gets dropped so
                // the scan can make progress.
                Err(_) => 0,
            };
            store.delete(uuid).await?;
            freed = freed.saturating_add(size);
            evicted += 1;
            tracing::info!(product = %uuid, size, "evicted product");
            if let Some(bus) = events {
                bus.publish(ProductEvent::Deleted {
                    uuid,
                    store: store.name().to_string(),
                });
            }
        }
    }

    Ok(freed)
}

/// Policy-driven eviction pass runner for externally scheduled eviction.
pub struct Evictor {
    conf: EvictionConf,
    events: Option<EventBus>,
}

impl Evictor {
    pub fn new(conf: EvictionConf, events: Option<EventBus>) -> Self {
        Self { conf, events }
    }

    /// Free `bytes_needed` on a store using the configured pass bound.
    pub async fn evict(
        &self,
        store: &dyn DataStore,
        keystore: &dyn KeyStore,
        bytes_needed: u64,
    ) -> DataStoreResult<u64> {
        free_space(
            store,
            keystore,
            bytes_needed,
            self.conf.max_evicted,
            self.events.as_ref(),
        )
        .await
    }
}
