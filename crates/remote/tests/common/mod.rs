//! Shared test doubles: a scripted archive and an in-memory cache store.

use async_trait::async_trait;
use bytes::Bytes;
use hangar_core::{Product, ProductContent};
use hangar_remote::{FetchResponse, RemoteArchive, RemoteJob, RemoteProductMeta};
use hangar_remote::{RemoteError, RemoteResult};
use hangar_storage::{DataStore, DataStoreError, DataStoreResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Archive double serving in-memory products, with scriptable mid-stream
/// failures and transient submission faults.
#[derive(Default)]
pub struct ScriptedArchive {
    products: Mutex<HashMap<Uuid, (String, Bytes)>>,
    jobs: Mutex<HashMap<String, RemoteJob>>,
    next_job: AtomicUsize,
    /// Byte counts after which successive fetch attempts are cut short;
    /// once drained, fetches run to completion.
    cut_points: Mutex<VecDeque<usize>>,
    /// Number of submissions that fail before one succeeds.
    submit_faults: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub fetch_offsets: Mutex<Vec<u64>>,
}

impl ScriptedArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, uuid: Uuid, name: &str, data: &[u8]) {
        self.products
            .lock()
            .unwrap()
            .insert(uuid, (name.to_string(), Bytes::copy_from_slice(data)));
    }

    /// Cut the next fetch attempts short after the given byte counts.
    pub fn cut_after(&self, points: &[usize]) {
        self.cut_points.lock().unwrap().extend(points.iter().copied());
    }

    pub fn fail_next_submits(&self, count: usize) {
        self.submit_faults.store(count, Ordering::SeqCst);
    }

    /// Flip every job for the product to the given raw status.
    pub fn set_job_status(&self, uuid: Uuid, status: &str) {
        for job in self.jobs.lock().unwrap().values_mut() {
            if job.product_uuid == uuid {
                job.status = status.to_string();
            }
        }
    }
}

#[async_trait]
impl RemoteArchive for ScriptedArchive {
    async fn submit_order(&self, uuid: Uuid) -> RemoteResult<RemoteJob> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if !self.products.lock().unwrap().contains_key(&uuid) {
            return Err(RemoteError::ProductNotFound(uuid));
        }
        let faults = self.submit_faults.load(Ordering::SeqCst);
        if faults > 0 {
            self.submit_faults.store(faults - 1, Ordering::SeqCst);
            return Err(RemoteError::Protocol("archive hiccup".to_string()));
        }
        let id = format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
        let job = RemoteJob {
            id: id.clone(),
            product_uuid: uuid,
            status: "queued".to_string(),
            submitted_at: None,
            estimated_at: None,
            message: None,
        };
        self.jobs.lock().unwrap().insert(id, job.clone());
        Ok(job)
    }

    async fn list_jobs(&self) -> RemoteResult<Vec<RemoteJob>> {
        Ok(self.jobs.lock().unwrap().values().cloned().collect())
    }

    async fn job_status(&self, job_id: &str) -> RemoteResult<RemoteJob> {
        self.jobs
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| RemoteError::JobNotFound(job_id.to_string()))
    }

    async fn product_meta(&self, uuid: Uuid) -> RemoteResult<Option<RemoteProductMeta>> {
        Ok(self.products.lock().unwrap().get(&uuid).map(|(name, data)| {
            RemoteProductMeta {
                uuid,
                name: name.clone(),
                content_length: data.len() as u64,
                etag: Some(format!("\"etag-{uuid}\"")),
            }
        }))
    }

    async fn fetch(
        &self,
        uuid: Uuid,
        skip: u64,
        _etag: Option<&str>,
    ) -> RemoteResult<FetchResponse> {
        self.fetch_offsets.lock().unwrap().push(skip);
        let data = self
            .products
            .lock()
            .unwrap()
            .get(&uuid)
            .map(|(_, data)| data.clone())
            .ok_or(RemoteError::ProductNotFound(uuid))?;

        let cut = self.cut_points.lock().unwrap().pop_front();
        let remaining = data.slice(skip.min(data.len() as u64) as usize..);
        let served = match cut {
            Some(cut) => remaining.slice(..cut.min(remaining.len())),
            None => remaining,
        };

        // Serve in small chunks so resumption lands mid-transfer.
        let mut items: Vec<RemoteResult<Bytes>> = served
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        if cut.is_some() {
            items.push(Err(RemoteError::Protocol("connection reset".to_string())));
        }
        Ok(FetchResponse {
            etag: Some(format!("\"etag-{uuid}\"")),
            stream: Box::pin(futures::stream::iter(items)),
        })
    }
}

/// Minimal in-memory cache store.
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
