//! Prioritized registry of data stores.

use crate::error::{DataStoreError, DataStoreResult};
use crate::traits::DataStore;
use hangar_core::{EventBus, Product, ProductEvent};
use std::sync::{Arc, RwLock};
use tracing::instrument;
use uuid::Uuid;

/// Direction of the priority comparison during resolution.
///
/// The operational convention is configurable rather than hard-wired;
/// ties are broken by registration order either way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriorityOrder {
    /// Lower priority value is tried first.
    #[default]
    LowestFirst,
    /// Higher priority value is tried first.
    HighestFirst,
}

/// Ordered collection of named data stores.
///
/// Resolution tries stores in priority order and returns the first hit;
/// writes target the first writable store that admits the product.
pub struct DataStoreManager {
    stores: RwLock<Vec<Arc<dyn DataStore>>>,
    order: PriorityOrder,
    events: Option<EventBus>,
}

impl DataStoreManager {
    pub fn new(order: PriorityOrder) -> Self {
        Self {
            stores: RwLock::new(Vec::new()),
            order,
            events: None,
        }
    }

    /// Attach an event bus; store/delete operations publish product change
    /// notifications on it.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Register a store. A duplicate name is rejected with
    /// `NameUnavailable` rather than silently overwriting.
    pub fn add(&self, store: Arc<dyn DataStore>) -> DataStoreResult<()> {
        let mut stores = self.stores.write().unwrap();
        if stores.iter().any(|s| s.name() == store.name()) {
            return Err(DataStoreError::NameUnavailable(store.name().to_string()));
        }
        stores.push(store);
        // Stable sort keeps registration order for equal priorities.
        match self.order {
            PriorityOrder::LowestFirst => stores.sort_by_key(|s| s.priority()),
            PriorityOrder::HighestFirst => stores.sort_by_key(|s| std::cmp::Reverse(s.priority())),
        }
        Ok(())
    }

    /// Unregister and return a store by name.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn DataStore>> {
        let mut stores = self.stores.write().unwrap();
        let idx = stores.iter().position(|s| s.name() == name)?;
        Some(stores.remove(idx))
    }

    pub fn get_store(&self, name: &str) -> Option<Arc<dyn DataStore>> {
        self.stores
            .read()
            .unwrap()
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Snapshot of registered stores in resolution order.
    pub fn stores(&self) -> Vec<Arc<dyn DataStore>> {
        self.stores.read().unwrap().clone()
    }

    /// Retrieve a product from the first store holding it.
    ///
    /// A store that reports an open asynchronous order is treated as a
    /// miss while the remaining stores are consulted; if nothing else has
    /// the product, that order is surfaced to the caller instead of a
    /// plain not-found.
    #[instrument(skip(self))]
    pub async fn get(&self, uuid: Uuid) -> DataStoreResult<Product> {
        let stores = self.stores();
        let mut open_order: Option<DataStoreError> = None;

        for store in stores {
            match store.get(uuid).await {
                Ok(product) => return Ok(product),
                Err(DataStoreError::ProductNotFound(_)) => {}
                Err(err @ DataStoreError::OrderInProgress(_)) => {
                    open_order.get_or_insert(err);
                }
                Err(other) => {
                    tracing::warn!(
                        store = store.name(),
                        product = %uuid,
                        error = %other,
                        "store failed during resolution, trying next"
                    );
                }
            }
        }

        Err(open_order.unwrap_or(DataStoreError::ProductNotFound(uuid)))
    }

    /// Store a product on the first writable store that admits it,
    /// returning the chosen store's name.
    #[instrument(skip(self, product), fields(product = %product.uuid()))]
    pub async fn set(&self, product: &Product) -> DataStoreResult<String> {
        for store in self.stores() {
            if store.read_only() {
                continue;
            }
            match store.set(product).await {
                Ok(()) => {
                    if let Some(bus) = &self.events {
                        bus.publish(ProductEvent::Created {
                            uuid: product.uuid(),
                            store: store.name().to_string(),
                        });
                    }
                    return Ok(store.name().to_string());
                }
                Err(
                    DataStoreError::ReadOnly(_)
                    | DataStoreError::InsufficientSpace { .. }
                    | DataStoreError::Unsupported { .. },
                ) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(DataStoreError::NoStoreAvailable(product.uuid()))
    }

    /// Relocate a product into the first store that supports relocation.
    #[instrument(skip(self, product), fields(product = %product.uuid()))]
    pub async fn move_in(&self, product: Product) -> DataStoreResult<String> {
        let uuid = product.uuid();
        // Relocation consumes the source, so it targets exactly one store:
        // the highest-priority writable one.
        let Some(store) = self.stores().into_iter().find(|s| !s.read_only()) else {
            return Err(DataStoreError::NoStoreAvailable(uuid));
        };
        store.move_in(product).await?;
        if let Some(bus) = &self.events {
            bus.publish(ProductEvent::Created {
                uuid,
                store: store.name().to_string(),
            });
        }
        Ok(store.name().to_string())
    }

    /// Delete a product from every store that has it; not-found only when
    /// no store had it.
    #[instrument(skip(self))]
    pub async fn delete(&self, uuid: Uuid) -> DataStoreResult<()> {
        let mut found = false;
        for store in self.stores() {
            match store.exists(uuid).await {
                Ok(true) => {
                    store.delete(uuid).await?;
                    found = true;
                    if let Some(bus) = &self.events {
                        bus.publish(ProductEvent::Deleted {
                            uuid,
                            store: store.name().to_string(),
                        });
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        store = store.name(),
                        product = %uuid,
                        error = %err,
                        "existence check failed during delete"
                    );
                }
            }
        }
        if found {
            Ok(())
        } else {
            Err(DataStoreError::ProductNotFound(uuid))
        }
    }

    /// Whether any store knows the product.
    pub async fn exists(&self, uuid: Uuid) -> bool {
        for store in self.stores() {
            if matches!(store.exists(uuid).await, Ok(true)) {
                return true;
            }
        }
        false
    }
}
