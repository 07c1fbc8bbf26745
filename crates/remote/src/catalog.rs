//! Read-only DataStore over a remote catalog that serves bytes directly.

use crate::client::RemoteArchive;
use crate::download::ProductDownloadTask;
use async_trait::async_trait;
use bytes::Bytes;
use hangar_core::{DataStoreConf, Product};
use hangar_storage::{DataStore, DataStoreError, DataStoreResult};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::instrument;
use uuid::Uuid;

/// Synchronous remote store: unlike [`crate::AsyncDataStore`] the archive
/// serves product bytes on the spot, so a get is one (resumable) download
/// with no order lifecycle. Every mutation is rejected.
pub struct HttpCatalogStore {
    conf: DataStoreConf,
    archive: Arc<dyn RemoteArchive>,
    max_download_attempts: u32,
}

impl HttpCatalogStore {
    pub fn new(
        conf: DataStoreConf,
        archive: Arc<dyn RemoteArchive>,
        max_download_attempts: u32,
    ) -> Self {
        Self {
            conf,
            archive,
            max_download_attempts,
        }
    }
}

#[async_trait]
impl DataStore for HttpCatalogStore {
    fn name(&self) -> &str {
        &self.conf.name
    }

    fn priority(&self) -> i32 {
        self.conf.priority
    }

    fn read_only(&self) -> bool {
        true
    }

    /// The payload is buffered in memory rather than staged on disk, so
    /// the returned product owns its content outright and nothing is left
    /// behind to clean up.
    #[instrument(skip(self), fields(store = %self.conf.name))]
    async fn get(&self, uuid: Uuid) -> DataStoreResult<Product> {
        let meta = self
            .archive
            .product_meta(uuid)
            .await
            .map_err(DataStoreError::from)?
            .ok_or(DataStoreError::ProductNotFound(uuid))?;

        let task = ProductDownloadTask::new(
            Arc::clone(&self.archive),
            uuid,
            0,
            meta.content_length,
            self.max_download_attempts,
        );
        let mut reader = task.start();

        let mut data = Vec::with_capacity(meta.content_length as usize);
        reader.read_to_end(&mut data).await?;

        Ok(Product::from_bytes(uuid, meta.name, Bytes::from(data)))
    }

    async fn set(&self, _product: &Product) -> DataStoreResult<()> {
        Err(DataStoreError::ReadOnly(self.conf.name.clone()))
    }

    async fn move_in(&self, _product: Product) -> DataStoreResult<()> {
        Err(DataStoreError::ReadOnly(self.conf.name.clone()))
    }

    async fn delete(&self, _uuid: Uuid) -> DataStoreResult<()> {
        Err(DataStoreError::ReadOnly(self.conf.name.clone()))
    }

    async fn exists(&self, uuid: Uuid) -> DataStoreResult<bool> {
        Ok(self
            .archive
            .product_meta(uuid)
            .await
            .map_err(DataStoreError::from)?
            .is_some())
    }

    /// A catalog store never holds local copies.
    async fn has_product(&self, _uuid: Uuid) -> DataStoreResult<bool> {
        Ok(false)
    }

    async fn current_size(&self) -> DataStoreResult<u64> {
        Ok(0)
    }
}
