//! Worker-pool ingestion pipeline.
//!
//! Discovered payloads are queued by source so no single source can
//! monopolize the workers, then ingested: checksum, product construction,
//! placement through the store manager. Stored products are announced on
//! the manager's event bus.

use crate::error::IngestResult;
use crate::queue::FairTaskQueue;
use hangar_core::{Checksum, IngestConf, Product};
use hangar_storage::DataStoreManager;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// A payload found by a scanner, waiting to be ingested.
#[derive(Clone, Debug)]
pub struct DiscoveredItem {
    /// Identity assigned at discovery time.
    pub uuid: Uuid,
    /// Local path of the payload.
    pub path: PathBuf,
    /// Fairness key, usually the scanner or collection name.
    pub source: Option<String>,
}

impl DiscoveredItem {
    pub fn new(path: impl Into<PathBuf>, source: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            path: path.into(),
            source,
        }
    }
}

/// Ingestion worker pool over a fair queue.
///
/// Workers run until `shutdown`; a failed item is logged, any partial
/// placement is rolled back, and the worker moves on to the next item.
pub struct Ingester {
    conf: IngestConf,
    manager: Arc<DataStoreManager>,
    queue: Arc<FairTaskQueue<DiscoveredItem>>,
    stopping: Arc<AtomicBool>,
    workers: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    ingested: AtomicU64,
    failed: AtomicU64,
}

impl Ingester {
    pub fn new(conf: IngestConf, manager: Arc<DataStoreManager>) -> Arc<Self> {
        Arc::new(Self {
            conf,
            manager,
            queue: Arc::new(FairTaskQueue::new()),
            stopping: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            ingested: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    /// Queue an item for ingestion.
    pub fn submit(&self, item: DiscoveredItem) {
        let source = item.source.clone();
        self.queue.push(source.as_deref(), item);
    }

    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    pub fn ingested_count(&self) -> u64 {
        self.ingested.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Spawn the worker pool. Idempotent only across a start/stop cycle.
    pub fn start(self: &Arc<Self>) {
        let poll_timeout = Duration::from_millis(self.conf.poll_timeout_ms);
        let mut workers = self.workers.lock().unwrap();
        for worker in 0..self.conf.worker_count {
            let ingester = Arc::clone(self);
            workers.push(tokio::spawn(async move {
                tracing::debug!(worker, "ingestion worker started");
                while !ingester.stopping.load(Ordering::SeqCst) {
                    let Some(item) = ingester.queue.poll(poll_timeout).await else {
                        continue;
                    };
                    ingester.handle(item).await;
                }
                tracing::debug!(worker, "ingestion worker stopped");
            }));
        }
    }

    /// Stop accepting work and wait for the workers to finish their
    /// current items.
    pub async fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.queue.wake_all();
        let workers = {
            let mut guard = self.workers.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        for worker in workers {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "ingestion worker panicked");
            }
        }
    }

    async fn handle(&self, item: DiscoveredItem) {
        let uuid = item.uuid;
        let path = item.path.clone();
        match self.process(item).await {
            Ok(store) => {
                self.ingested.fetch_add(1, Ordering::SeqCst);
                tracing::info!(product = %uuid, store, "product ingested");
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(
                    product = %uuid,
                    path = %path.display(),
                    error = %err,
                    "ingestion failed"
                );
                // Roll back any partial placement.
                let _ = self.manager.delete(uuid).await;
            }
        }
    }

    /// Ingest one discovered item, returning the name of the store that
    /// accepted it.
    #[instrument(skip(self, item), fields(product = %item.uuid))]
    async fn process(&self, item: DiscoveredItem) -> IngestResult<String> {
        let checksum = Checksum::sha256_file(&item.path).await?;
        let product = Product::from_file(item.uuid, &item.path)
            .await?
            .with_checksum(checksum);
        let store = self.manager.set(&product).await?;
        Ok(store)
    }
}
