//! In-memory store double for pipeline tests.

use async_trait::async_trait;
use bytes::Bytes;
use hangar_core::{Product, ProductContent};
use hangar_storage::{DataStore, DataStoreError, DataStoreResult};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

pub struct MemDataStore {
    name: String,
    contents: Mutex<HashMap<Uuid, (String, Bytes)>>,
}

impl MemDataStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            contents: Mutex::new(HashMap::new()),
        }
    }

    pub fn bytes_of(&self, uuid: Uuid) -> Option<Bytes> {
        self.contents
            .lock()
            .unwrap()
            .get(&uuid)
            .map(|(_, data)| data.clone())
    }
}

#[async_trait]
impl DataStore for MemDataStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        50
    }

    fn read_only(&self) -> bool {
        false
    }

    async fn get(&self, uuid: Uuid) -> DataStoreResult<Product> {
        let (name, data) = self
            .contents
            .lock()
            .unwrap()
            .get(&uuid)
            .cloned()
            .ok_or(DataStoreError::ProductNotFound(uuid))?;
        Ok(Product::from_bytes(uuid, name, data))
    }

    async fn set(&self, product: &Product) -> DataStoreResult<()> {
        let data = match product.content() {
            ProductContent::Bytes(data) => data.clone(),
            ProductContent::File(path) => Bytes::from(tokio::fs::read(path).await?),
        };
        self.contents
            .lock()
            .unwrap()
            .insert(product.uuid(), (product.name().to_string(), data));
        Ok(())
    }

    async fn move_in(&self, product: Product) -> DataStoreResult<()> {
        let uuid = product.uuid();
        let name = product.name().to_string();
        let data = match product.into_content() {
            ProductContent::Bytes(data) => data,
            ProductContent::File(path) => {
                let data = Bytes::from(tokio::fs::read(&path).await?);
                tokio::fs::remove_file(&path).await?;
                data
            }
        };
        self.contents.lock().unwrap().insert(uuid, (name, data));
        Ok(())
    }

    async fn delete(&self, uuid: Uuid) -> DataStoreResult<()> {
        self.contents
            .lock()
            .unwrap()
            .remove(&uuid)
            .map(|_| ())
            .ok_or(DataStoreError::ProductNotFound(uuid))
    }

    async fn exists(&self, uuid: Uuid) -> DataStoreResult<bool> {
        Ok(self.contents.lock().unwrap().contains_key(&uuid))
    }

    async fn has_product(&self, uuid: Uuid) -> DataStoreResult<bool> {
        self.exists(uuid).await
    }

    async fn current_size(&self) -> DataStoreResult<u64> {
        Ok(self
            .contents
            .lock()
            .unwrap()
            .values()
            .map(|(_, data)| data.len() as u64)
            .sum())
    }
}
