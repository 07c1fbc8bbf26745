//! Shared test fixtures: an in-memory DataStore mock.

use async_trait::async_trait;
use bytes::Bytes;
use hangar_core::{Product, ProductContent};
use hangar_storage::{DataStore, DataStoreError, DataStoreResult};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Minimal in-memory store for manager resolution tests.
pub struct MemDataStore {
    name: String,
    priority: i32,
    read_only: bool,
    objects: Mutex<HashMap<Uuid, Bytes>>,
}

impl MemDataStore {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            read_only: false,
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn read_only(name: &str, priority: i32) -> Self {
        Self {
            read_only: true,
            ..Self::new(name, priority)
        }
    }

    pub fn insert(&self, uuid: Uuid, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(uuid, Bytes::copy_from_slice(data));
    }
}

#[async_trait]
impl DataStore for MemDataStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn get(&self, uuid: Uuid) -> DataStoreResult<Product> {
        let objects = self.objects.lock().unwrap();
        let data = objects
            .get(&uuid)
            .cloned()
            .ok_or(DataStoreError::ProductNotFound(uuid))?;
        Ok(Product::from_bytes(uuid, uuid.to_string(), data))
    }

    async fn set(&self, product: &Product) -> DataStoreResult<()> {
        if self.read_only {
            return Err(DataStoreError::ReadOnly(self.name.clone()));
        }
        let data = match product.content() {
            ProductContent::Bytes(data) => data.clone(),
            ProductContent::File(path) => Bytes::from(std::fs::read(path)?),
        };
        self.objects.lock().unwrap().insert(product.uuid(), data);
        Ok(())
    }

    async fn move_in(&self, product: Product) -> DataStoreResult<()> {
        self.set(&product).await?;
        if let ProductContent::File(path) = product.content() {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }

    async fn delete(&self, uuid: Uuid) -> DataStoreResult<()> {
        if self.read_only {
            return Err(DataStoreError::ReadOnly(self.name.clone()));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&uuid)
            .map(|_| ())
            .ok_or(DataStoreError::ProductNotFound(uuid))
    }

    async fn exists(&self, uuid: Uuid) -> DataStoreResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(&uuid))
    }

    async fn has_product(&self, uuid: Uuid) -> DataStoreResult<bool> {
        self.exists(uuid).await
    }

    async fn current_size(&self) -> DataStoreResult<u64> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.values().map(|d| d.len() as u64).sum())
    }
}
