//! Key-partitioned fair task queue.
//!
//! Items are grouped into partitions by an opaque key and consumed
//! round-robin across partitions, so one prolific source cannot starve the
//! others. Within a partition, FIFO order is preserved.

use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Partition key for items submitted without one.
pub const UNKNOWN_PARTITION: &str = "unknown";

struct Inner<T> {
    /// Non-empty partitions in first-seen order. Emptied partitions are
    /// removed immediately, so every held queue has at least one item.
    partitions: IndexMap<String, VecDeque<T>>,
    /// Partition served by the previous take.
    last_key: Option<String>,
    /// Its index at that time, the fallback cursor when the partition has
    /// since been drained and removed.
    last_index: usize,
}

/// Blocking multi-producer multi-consumer queue with per-key fairness.
pub struct FairTaskQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
    len: AtomicUsize,
}

impl<T> FairTaskQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                partitions: IndexMap::new(),
                last_key: None,
                last_index: 0,
            }),
            notify: Notify::new(),
            len: AtomicUsize::new(0),
        }
    }

    /// Append an item to its partition; `None` lands in the shared
    /// unknown partition.
    pub fn push(&self, partition: Option<&str>, item: T) {
        let key = partition.unwrap_or(UNKNOWN_PARTITION);
        {
            let mut inner = self.inner.lock().unwrap();
            inner
                .partitions
                .entry(key.to_string())
                .or_default()
                .push_back(item);
        }
        self.len.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Index of the partition the next take will serve.
    fn next_index(inner: &Inner<T>) -> Option<usize> {
        let count = inner.partitions.len();
        if count == 0 {
            return None;
        }
        Some(match &inner.last_key {
            // The previously served partition still exists: move past it.
            Some(key) => match inner.partitions.get_index_of(key) {
                Some(at) => (at + 1) % count,
                // It was drained away; its successor slid into its slot.
                None => inner.last_index % count,
            },
            None => 0,
        })
    }

    /// Take the next item according to the rotation, without blocking.
    pub fn try_take(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        let idx = Self::next_index(&inner)?;
        let (key, queue) = inner.partitions.get_index_mut(idx)?;
        let key = key.clone();
        let item = queue.pop_front()?;
        let emptied = queue.is_empty();
        if emptied {
            inner.partitions.shift_remove(&key);
        }
        inner.last_key = Some(key);
        inner.last_index = idx;
        self.len.fetch_sub(1, Ordering::SeqCst);
        Some(item)
    }

    /// The item the next take would return, without consuming it or
    /// advancing the rotation.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let inner = self.inner.lock().unwrap();
        let idx = Self::next_index(&inner)?;
        let (_, queue) = inner.partitions.get_index(idx)?;
        queue.front().cloned()
    }

    /// Take the next item, waiting until one is available.
    pub async fn take(&self) -> T {
        loop {
            if let Some(item) = self.try_take() {
                return item;
            }
            // Register before the re-check so a push between the two cannot
            // be missed.
            let notified = self.notify.notified();
            if let Some(item) = self.try_take() {
                return item;
            }
            notified.await;
        }
    }

    /// Take the next item, giving up after `timeout`.
    pub async fn poll(&self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, self.take()).await.ok()
    }

    /// Remove every item matching the predicate, keeping the rotation
    /// cursor in place. Returns the number removed.
    pub fn remove(&self, predicate: impl Fn(&T) -> bool) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let mut removed = 0;
        for queue in inner.partitions.values_mut() {
            let before = queue.len();
            queue.retain(|item| !predicate(item));
            removed += before - queue.len();
        }
        inner.partitions.retain(|_, queue| !queue.is_empty());
        self.len.fetch_sub(removed, Ordering::SeqCst);
        removed
    }

    /// Drain everything, in rotation order.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(item) = self.try_take() {
            out.push(item);
        }
        out
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.partitions.clear();
        inner.last_key = None;
        inner.last_index = 0;
        self.len.store(0, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake every blocked consumer so shutdown flags get observed.
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }
}

impl<T> Default for FairTaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
