//! Local filesystem (hierarchical file system) data store.

use crate::error::{DataStoreError, DataStoreResult};
use crate::eviction;
use crate::hierarchy::HierarchicalDirectoryAllocator;
use crate::traits::DataStore;
use crate::usage::SizeAccounting;
use async_trait::async_trait;
use hangar_core::{HfsConf, Product, ProductContent};
use hangar_keystore::{KeyStore, KeyStoreDb, PersistentKeyStore, TAG_UNALTERED};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Data store keeping product payloads as files under allocator-assigned
/// directories. The persistent keystore maps product uuids to absolute
/// paths, and both the keystore and size accounting survive restarts.
pub struct HfsDataStore {
    conf: HfsConf,
    allocator: Arc<HierarchicalDirectoryAllocator>,
    keystore: PersistentKeyStore,
    accounting: SizeAccounting,
}

impl HfsDataStore {
    pub async fn new(conf: HfsConf, db: &KeyStoreDb) -> DataStoreResult<Self> {
        fs::create_dir_all(&conf.root).await?;
        let allocator = Arc::new(HierarchicalDirectoryAllocator::new(
            &conf.root,
            conf.max_items,
            conf.max_occurrence,
        )?);
        let keystore = db.keystore(&conf.common.name);
        let accounting = SizeAccounting::new(
            &conf.common.name,
            conf.common.maximum_size,
            Some(db.usage(&conf.common.name)),
        )
        .await?;
        Ok(Self {
            conf,
            allocator,
            keystore,
            accounting,
        })
    }

    pub fn keystore(&self) -> &PersistentKeyStore {
        &self.keystore
    }

    /// Flush allocator state; called once by the owning process on exit.
    pub fn shutdown(&self) -> DataStoreResult<()> {
        self.allocator.shutdown()
    }

    fn check_writable(&self) -> DataStoreResult<()> {
        if self.conf.common.read_only {
            return Err(DataStoreError::ReadOnly(self.conf.common.name.clone()));
        }
        Ok(())
    }

    /// Resolve a destination directory off the async runtime; the
    /// allocator's resolve-and-persist sequence is blocking filesystem work.
    async fn allocate_dir(&self, filename: &str) -> DataStoreResult<PathBuf> {
        let allocator = Arc::clone(&self.allocator);
        let filename = filename.to_string();
        tokio::task::spawn_blocking(move || allocator.get_directory(Some(&filename)))
            .await
            .map_err(|e| {
                DataStoreError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Make room for `incoming` bytes, evicting oldest products when
    /// auto-eviction is enabled.
    async fn ensure_capacity(&self, incoming: u64) -> DataStoreResult<()> {
        if self.accounting.fits(incoming).await {
            return Ok(());
        }
        if !self.conf.common.auto_eviction {
            return Err(DataStoreError::InsufficientSpace {
                store: self.conf.common.name.clone(),
                needed: incoming,
                available: self.accounting.available().await.unwrap_or(0),
            });
        }

        let available = self.accounting.available().await.unwrap_or(0);
        let shortfall = incoming.saturating_sub(available);
        eviction::free_space(
            self,
            &self.keystore,
            shortfall,
            self.conf.eviction.max_evicted,
            None,
        )
        .await?;

        if self.accounting.fits(incoming).await {
            Ok(())
        } else {
            Err(DataStoreError::InsufficientSpace {
                store: self.conf.common.name.clone(),
                needed: incoming,
                available: self.accounting.available().await.unwrap_or(0),
            })
        }
    }

    /// Drop any previous payload recorded for this uuid so an overwrite
    /// does not leak bytes or double-count sizes.
    async fn drop_previous(&self, uuid: Uuid) -> DataStoreResult<()> {
        if let Some(old) = self.keystore.get(uuid, TAG_UNALTERED).await? {
            let old_path = PathBuf::from(&old);
            let old_size = fs::metadata(&old_path).await.map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&old_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(DataStoreError::Io(e)),
            }
            self.accounting.sub(old_size).await?;
        }
        Ok(())
    }

    /// Write in-memory content atomically: temp file, fsync, rename.
    ///
    /// The temp name appends to the full file name with a unique suffix;
    /// same-stem destinations such as `a.zip` and `a.tar` must never share
    /// a temp path under concurrent writers.
    async fn write_bytes(dest: &Path, data: &[u8]) -> DataStoreResult<()> {
        let temp_suffix = format!(".tmp.{}", Uuid::new_v4());
        let temp = dest.with_file_name(
            dest.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_suffix))
                .unwrap_or_else(|| temp_suffix.clone()),
        );
        {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp, dest).await?;
        Ok(())
    }

    async fn store_content(
        &self,
        uuid: Uuid,
        name: &str,
        content: &ProductContent,
        relocate: bool,
    ) -> DataStoreResult<()> {
        let size = content.len().await.map_err(io_from_core)?;
        self.ensure_capacity(size).await?;
        self.drop_previous(uuid).await?;

        let dir = self.allocate_dir(name).await?;
        let dest = dir.join(name);

        match content {
            ProductContent::Bytes(data) => Self::write_bytes(&dest, data).await?,
            ProductContent::File(source) => {
                if relocate {
                    match fs::rename(source, &dest).await {
                        Ok(()) => {}
                        // Cross-device rename: fall back to copy + remove.
                        Err(_) => {
                            fs::copy(source, &dest).await?;
                            fs::remove_file(source).await?;
                        }
                    }
                } else {
                    fs::copy(source, &dest).await?;
                }
            }
        }

        self.keystore
            .put(uuid, TAG_UNALTERED, &dest.to_string_lossy())
            .await?;
        self.accounting.add(size).await?;
        Ok(())
    }
}

fn io_from_core(err: hangar_core::CoreError) -> DataStoreError {
    match err {
        hangar_core::CoreError::Io(e) => DataStoreError::Io(e),
        other => DataStoreError::InvalidArgument(other.to_string()),
    }
}

#[async_trait]
impl DataStore for HfsDataStore {
    fn name(&self) -> &str {
        &self.conf.common.name
    }

    fn priority(&self) -> i32 {
        self.conf.common.priority
    }

    fn read_only(&self) -> bool {
        self.conf.common.read_only
    }

    #[instrument(skip(self), fields(store = %self.conf.common.name))]
    async fn get(&self, uuid: Uuid) -> DataStoreResult<Product> {
        let path = self
            .keystore
            .get(uuid, TAG_UNALTERED)
            .await?
            .ok_or(DataStoreError::ProductNotFound(uuid))?;
        Product::from_file(uuid, PathBuf::from(path))
            .await
            .map_err(io_from_core)
    }

    #[instrument(skip(self, product), fields(store = %self.conf.common.name, product = %product.uuid()))]
    async fn set(&self, product: &Product) -> DataStoreResult<()> {
        self.check_writable()?;
        self.store_content(product.uuid(), product.name(), product.content(), false)
            .await
    }

    #[instrument(skip(self, product), fields(store = %self.conf.common.name, product = %product.uuid()))]
    async fn move_in(&self, product: Product) -> DataStoreResult<()> {
        self.check_writable()?;
        let uuid = product.uuid();
        let name = product.name().to_string();
        let content = product.into_content();
        self.store_content(uuid, &name, &content, true).await
    }

    #[instrument(skip(self), fields(store = %self.conf.common.name))]
    async fn delete(&self, uuid: Uuid) -> DataStoreResult<()> {
        self.check_writable()?;
        let path = self
            .keystore
            .remove(uuid, TAG_UNALTERED)
            .await?
            .ok_or(DataStoreError::ProductNotFound(uuid))?;

        let path = PathBuf::from(path);
        let size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(DataStoreError::Io(e)),
        }
        self.accounting.sub(size).await?;
        Ok(())
    }

    async fn exists(&self, uuid: Uuid) -> DataStoreResult<bool> {
        Ok(self.keystore.exists(uuid, TAG_UNALTERED).await?)
    }

    async fn has_product(&self, uuid: Uuid) -> DataStoreResult<bool> {
        match self.keystore.get(uuid, TAG_UNALTERED).await? {
            Some(path) => Ok(fs::try_exists(&path).await?),
            None => Ok(false),
        }
    }

    async fn current_size(&self) -> DataStoreResult<u64> {
        Ok(self.accounting.current().await)
    }
}
