//! Per-store size accounting.

use crate::error::DataStoreResult;
use hangar_keystore::UsageStore;
use tokio::sync::Mutex;

/// Tracks a store's current size against its optional maximum.
///
/// Updates are read-modify-persist critical sections under a per-store
/// mutex so concurrent ingestion never loses an update; the persisted row
/// (when a repo is attached) makes the figure restart-safe. The counter is
/// clamped at zero and never goes negative.
pub struct SizeAccounting {
    store_name: String,
    maximum: i64,
    current: Mutex<u64>,
    repo: Option<UsageStore>,
}

impl SizeAccounting {
    /// Create accounting for a store, loading the persisted size when a
    /// repo is attached.
    pub async fn new(
        store_name: impl Into<String>,
        maximum: i64,
        repo: Option<UsageStore>,
    ) -> DataStoreResult<Self> {
        let current = match &repo {
            Some(repo) => repo.load().await?,
            None => 0,
        };
        Ok(Self {
            store_name: store_name.into(),
            maximum,
            current: Mutex::new(current),
            repo,
        })
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Maximum size in bytes; `None` when unbounded.
    pub fn maximum(&self) -> Option<u64> {
        (self.maximum >= 0).then_some(self.maximum as u64)
    }

    pub async fn current(&self) -> u64 {
        *self.current.lock().await
    }

    /// Remaining headroom; `None` when unbounded.
    pub async fn available(&self) -> Option<u64> {
        let maximum = self.maximum()?;
        let current = *self.current.lock().await;
        Some(maximum.saturating_sub(current))
    }

    /// Whether `incoming` additional bytes fit without exceeding the
    /// maximum.
    pub async fn fits(&self, incoming: u64) -> bool {
        match self.available().await {
            Some(available) => incoming <= available,
            None => true,
        }
    }

    /// Record `delta` added bytes.
    pub async fn add(&self, delta: u64) -> DataStoreResult<()> {
        let mut current = self.current.lock().await;
        let next = current.saturating_add(delta);
        if let Some(repo) = &self.repo {
            repo.save(next).await?;
        }
        *current = next;
        Ok(())
    }

    /// Record `delta` removed bytes, clamped at zero.
    pub async fn sub(&self, delta: u64) -> DataStoreResult<()> {
        let mut current = self.current.lock().await;
        let next = current.saturating_sub(delta);
        if let Some(repo) = &self.repo {
            repo.save(next).await?;
        }
        *current = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_sub_clamp_at_zero() {
        let acc = SizeAccounting::new("s", -1, None).await.unwrap();
        acc.add(100).await.unwrap();
        assert_eq!(acc.current().await, 100);
        acc.sub(250).await.unwrap();
        assert_eq!(acc.current().await, 0);
    }

    #[tokio::test]
    async fn unbounded_always_fits() {
        let acc = SizeAccounting::new("s", -1, None).await.unwrap();
        assert!(acc.fits(u64::MAX).await);
        assert_eq!(acc.available().await, None);
    }

    #[tokio::test]
    async fn bounded_headroom() {
        let acc = SizeAccounting::new("s", 1000, None).await.unwrap();
        acc.add(600).await.unwrap();
        assert_eq!(acc.available().await, Some(400));
        assert!(acc.fits(400).await);
        assert!(!acc.fits(401).await);
    }
}
