//! DataStore backed by a local cache plus an order-based remote archive.

use crate::client::RemoteArchive;
use crate::download::ProductDownloadTask;
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use hangar_core::{Order, OrderStatus, Product, RemoteArchiveConf};
use hangar_storage::{DataStore, DataStoreError, DataStoreResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

/// Asynchronous DataStore: product misses become remote orders, and a
/// periodic polling pass downloads completed orders into the local cache.
///
/// Admission is bounded by `max_pending_requests`/`max_running_requests`;
/// a submission over either bound is rejected before any state changes.
/// Only the cluster's manager instance runs the polling loop; every
/// instance can inspect order state.
pub struct AsyncDataStore {
    conf: RemoteArchiveConf,
    cache: Arc<dyn DataStore>,
    archive: Arc<dyn RemoteArchive>,
    orders: Mutex<HashMap<Uuid, Order>>,
}

impl AsyncDataStore {
    pub fn new(
        conf: RemoteArchiveConf,
        cache: Arc<dyn DataStore>,
        archive: Arc<dyn RemoteArchive>,
    ) -> Arc<Self> {
        Arc::new(Self {
            conf,
            cache,
            archive,
            orders: Mutex::new(HashMap::new()),
        })
    }

    pub fn is_manager(&self) -> bool {
        self.conf.is_manager
    }

    /// Snapshot of all known orders.
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.lock().await.values().cloned().collect()
    }

    pub async fn order(&self, uuid: Uuid) -> Option<Order> {
        self.orders.lock().await.get(&uuid).cloned()
    }

    pub async fn pending_count(&self) -> usize {
        self.count_status(OrderStatus::Pending).await
    }

    pub async fn running_count(&self) -> usize {
        self.count_status(OrderStatus::Running).await
    }

    async fn count_status(&self, status: OrderStatus) -> usize {
        self.orders
            .lock()
            .await
            .values()
            .filter(|o| o.status == status)
            .count()
    }

    /// Submit a new order for a product, subject to admission control.
    #[instrument(skip(self), fields(store = %self.conf.common.name))]
    async fn submit(&self, uuid: Uuid) -> DataStoreResult<Order> {
        // The lock is held across the remote call so the admission check
        // and the registry insert form one critical section.
        let mut orders = self.orders.lock().await;

        let pending = orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending)
            .count();
        if pending >= self.conf.max_pending_requests {
            return Err(DataStoreError::CapacityExceeded(format!(
                "{}: {pending} pending orders (max {})",
                self.conf.common.name, self.conf.max_pending_requests
            )));
        }
        let running = orders
            .values()
            .filter(|o| o.status == OrderStatus::Running)
            .count();
        if running >= self.conf.max_running_requests {
            return Err(DataStoreError::CapacityExceeded(format!(
                "{}: {running} running orders (max {})",
                self.conf.common.name, self.conf.max_running_requests
            )));
        }

        let job = self.submit_with_retries(uuid).await?;

        let mut order = Order::new(&self.conf.common.name, uuid, job.id);
        order.status = OrderStatus::from_remote(&job.status);
        if order.status == OrderStatus::Unknown {
            order.status = OrderStatus::Pending;
        }
        if let Some(submitted) = job.submitted_at {
            order.submitted_at = submitted;
        }
        order.estimated_at = job.estimated_at;
        order.message = job.message;

        tracing::info!(
            product = %uuid,
            job = %order.job_id,
            "submitted remote order"
        );
        orders.insert(uuid, order.clone());
        Ok(order)
    }

    async fn submit_with_retries(&self, uuid: Uuid) -> RemoteResult<crate::client::RemoteJob> {
        let mut last_err = None;
        for attempt in 1..=self.conf.max_submit_attempts {
            match self.archive.submit_order(uuid).await {
                Ok(job) => return Ok(job),
                Err(err @ RemoteError::ProductNotFound(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        product = %uuid,
                        attempt,
                        error = %err,
                        "order submission failed"
                    );
                    last_err = Some(err);
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| RemoteError::Protocol("no submission attempts made".to_string())))
    }

    /// Spawn the periodic polling loop; returns `None` on non-manager
    /// instances.
    pub fn spawn_polling(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.conf.is_manager {
            return None;
        }
        let store = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(store.conf.poll_interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = store.poll_once().await {
                    tracing::error!(
                        store = %store.conf.common.name,
                        error = %err,
                        "polling pass failed"
                    );
                }
            }
        }))
    }

    /// One polling pass: reconcile local orders against remote job state
    /// and finalize completed ones. Per-order failures are isolated.
    #[instrument(skip(self), fields(store = %self.conf.common.name))]
    pub async fn poll_once(&self) -> DataStoreResult<()> {
        let jobs = self.archive.list_jobs().await.map_err(DataStoreError::from)?;

        for job in jobs {
            let current = {
                let orders = self.orders.lock().await;
                orders
                    .values()
                    .find(|o| o.job_id == job.id)
                    .map(|o| (o.product_uuid, o.status))
            };
            let Some((uuid, local_status)) = current else {
                // Job belongs to another instance or an older process life;
                // not ours to drive.
                continue;
            };
            if local_status.is_terminal() {
                continue;
            }

            let status = OrderStatus::from_remote(&job.status);
            match status {
                OrderStatus::Completed => {
                    let outcome = self.finalize(uuid).await;
                    let mut orders = self.orders.lock().await;
                    if let Some(order) = orders.get_mut(&uuid) {
                        match outcome {
                            Ok(()) => {
                                order.status = OrderStatus::Completed;
                                order.message = job.message.clone();
                            }
                            Err(err) => {
                                tracing::error!(
                                    product = %uuid,
                                    job = %job.id,
                                    error = %err,
                                    "download of completed order failed"
                                );
                                order.status = OrderStatus::Failed;
                                order.message = Some(err.to_string());
                            }
                        }
                    }
                }
                OrderStatus::Failed => {
                    let mut orders = self.orders.lock().await;
                    if let Some(order) = orders.get_mut(&uuid) {
                        order.status = OrderStatus::Failed;
                        order.message = job
                            .message
                            .clone()
                            .or_else(|| Some("order failed remotely".to_string()));
                    }
                }
                other => {
                    let mut orders = self.orders.lock().await;
                    if let Some(order) = orders.get_mut(&uuid) {
                        order.status = other;
                        order.estimated_at = job.estimated_at;
                        order.message = job.message.clone();
                    }
                }
            }
        }
        Ok(())
    }

    /// Download a prepared product into the local cache.
    async fn finalize(&self, uuid: Uuid) -> DataStoreResult<()> {
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
            self.conf.max_download_attempts,
        );
        let mut reader = task.start();

        // Stage next to nothing in memory: pipe into a per-order staging
        // file carrying the catalog name, then relocate into the cache.
        let staging_dir = std::env::temp_dir().join(format!("hangar-order-{uuid}"));
        tokio::fs::create_dir_all(&staging_dir).await?;
        let staging = staging_dir.join(&meta.name);
        let result = async {
            let mut file = tokio::fs::File::create(&staging).await?;
            tokio::io::copy(&mut reader, &mut file).await?;
            file.sync_all().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(err) = result {
            let _ = tokio::fs::remove_dir_all(&staging_dir).await;
            return Err(DataStoreError::Io(err));
        }

        let product = Product::from_file(uuid, &staging)
            .await
            .map_err(|e| DataStoreError::Remote(e.to_string()))?;
        let moved = self.cache.move_in(product).await;
        let _ = tokio::fs::remove_dir_all(&staging_dir).await;
        moved?;

        tracing::info!(
            product = %uuid,
            size = meta.content_length,
            "completed order cached locally"
        );
        Ok(())
    }
}

#[async_trait]
impl DataStore for AsyncDataStore {
    fn name(&self) -> &str {
        &self.conf.common.name
    }

    fn priority(&self) -> i32 {
        self.conf.common.priority
    }

    fn read_only(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(store = %self.conf.common.name))]
    async fn get(&self, uuid: Uuid) -> DataStoreResult<Product> {
        if self.cache.exists(uuid).await? {
            return self.cache.get(uuid).await;
        }

        if let Some(order) = self.order(uuid).await {
            match order.status {
                OrderStatus::Completed => {
                    // Completed but the cache copy is gone (evicted):
                    // fall through and order again.
                }
                OrderStatus::Failed => {
                    // Surfaced once; a new get retries with a fresh order.
                }
                _ => return Err(DataStoreError::OrderInProgress(Box::new(order))),
            }
        }

        let order = self.submit(uuid).await?;
        Err(DataStoreError::OrderInProgress(Box::new(order)))
    }

    /// The remote archive is not writable from this side.
    async fn set(&self, _product: &Product) -> DataStoreResult<()> {
        Err(DataStoreError::ReadOnly(self.conf.common.name.clone()))
    }

    async fn move_in(&self, _product: Product) -> DataStoreResult<()> {
        Err(DataStoreError::ReadOnly(self.conf.common.name.clone()))
    }

    /// Deletion only drops the local cache copy and order bookkeeping; the
    /// archive keeps its own holdings.
    async fn delete(&self, uuid: Uuid) -> DataStoreResult<()> {
        self.orders.lock().await.remove(&uuid);
        self.cache.delete(uuid).await
    }

    async fn exists(&self, uuid: Uuid) -> DataStoreResult<bool> {
        if self.cache.exists(uuid).await? {
            return Ok(true);
        }
        Ok(self
            .archive
            .product_meta(uuid)
            .await
            .map_err(DataStoreError::from)?
            .is_some())
    }

    async fn has_product(&self, uuid: Uuid) -> DataStoreResult<bool> {
        self.cache.has_product(uuid).await
    }

    async fn current_size(&self) -> DataStoreResult<u64> {
        self.cache.current_size().await
    }
}
