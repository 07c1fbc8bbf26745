//! SQLite-backed key store and datastore usage rows.

use crate::entry::KeyStoreEntry;
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::traits::KeyStore;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Shared SQLite database backing persistent key stores and usage rows.
///
/// One database serves every store in the process; rows are namespaced by
/// store name so independent backends never see each other's entries.
#[derive(Clone)]
pub struct KeyStoreDb {
    pool: Pool<Sqlite>,
}

impl KeyStoreDb {
    /// Open (creating if missing) a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> KeyStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
            .map_err(KeyStoreError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        // SQLite permits limited write concurrency; a single connection avoids
        // persistent lock failures under concurrent ingestion.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open an in-memory database (test and volatile-cluster use).
    pub async fn open_in_memory() -> KeyStoreResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(KeyStoreError::Database)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> KeyStoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS keystore_entries (
                store_name   TEXT NOT NULL,
                product_uuid TEXT NOT NULL,
                tag          TEXT NOT NULL,
                value        TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                PRIMARY KEY (store_name, product_uuid, tag)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_keystore_entries_age
             ON keystore_entries (store_name, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS datastore_usage (
                store_name   TEXT PRIMARY KEY,
                current_size INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// A persistent key store namespaced to one datastore.
    pub fn keystore(&self, store_name: impl Into<String>) -> PersistentKeyStore {
        PersistentKeyStore {
            pool: self.pool.clone(),
            store_name: store_name.into(),
        }
    }

    /// The usage row accessor for one datastore.
    pub fn usage(&self, store_name: impl Into<String>) -> UsageStore {
        UsageStore {
            pool: self.pool.clone(),
            store_name: store_name.into(),
        }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

/// Durable key store backed by a `KeyStoreDb`.
#[derive(Clone)]
pub struct PersistentKeyStore {
    pool: Pool<Sqlite>,
    store_name: String,
}

impl PersistentKeyStore {
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> KeyStoreResult<KeyStoreEntry> {
        let uuid_text: String = row.try_get("product_uuid")?;
        let created_text: String = row.try_get("created_at")?;
        let key = Uuid::parse_str(&uuid_text)
            .map_err(|e| KeyStoreError::InvalidEntry(format!("bad uuid {uuid_text}: {e}")))?;
        let created_at = OffsetDateTime::parse(
            &created_text,
            &time::format_description::well_known::Rfc3339,
        )
        .map_err(|e| KeyStoreError::InvalidEntry(format!("bad timestamp {created_text}: {e}")))?;
        Ok(KeyStoreEntry {
            key,
            tag: row.try_get("tag")?,
            value: row.try_get("value")?,
            created_at,
        })
    }
}

#[async_trait]
impl KeyStore for PersistentKeyStore {
    async fn put(&self, key: Uuid, tag: &str, value: &str) -> KeyStoreResult<()> {
        if self.exists(key, tag).await? {
            tracing::warn!(
                store = %self.store_name,
                key = %key,
                tag = tag,
                "replacing existing key store entry"
            );
        }

        let created_at = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|e| KeyStoreError::InvalidEntry(format!("timestamp format: {e}")))?;

        sqlx::query(
            "INSERT INTO keystore_entries (store_name, product_uuid, tag, value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (store_name, product_uuid, tag)
             DO UPDATE SET value = excluded.value, created_at = excluded.created_at",
        )
        .bind(&self.store_name)
        .bind(key.to_string())
        .bind(tag)
        .bind(value)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: Uuid, tag: &str) -> KeyStoreResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM keystore_entries
             WHERE store_name = ?1 AND product_uuid = ?2 AND tag = ?3",
        )
        .bind(&self.store_name)
        .bind(key.to_string())
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn remove(&self, key: Uuid, tag: &str) -> KeyStoreResult<Option<String>> {
        let previous = self.get(key, tag).await?;
        if previous.is_some() {
            sqlx::query(
                "DELETE FROM keystore_entries
                 WHERE store_name = ?1 AND product_uuid = ?2 AND tag = ?3",
            )
            .bind(&self.store_name)
            .bind(key.to_string())
            .bind(tag)
            .execute(&self.pool)
            .await?;
        }
        Ok(previous)
    }

    async fn exists(&self, key: Uuid, tag: &str) -> KeyStoreResult<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM keystore_entries
                WHERE store_name = ?1 AND product_uuid = ?2 AND tag = ?3
            )",
        )
        .bind(&self.store_name)
        .bind(key.to_string())
        .bind(tag)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn oldest_entries(&self, limit: usize) -> KeyStoreResult<Vec<KeyStoreEntry>> {
        let rows = sqlx::query(
            "SELECT product_uuid, tag, value, created_at FROM keystore_entries
             WHERE store_name = ?1
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?2",
        )
        .bind(&self.store_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn entries_by_uuid(&self, key: Uuid) -> KeyStoreResult<Vec<KeyStoreEntry>> {
        let rows = sqlx::query(
            "SELECT product_uuid, tag, value, created_at FROM keystore_entries
             WHERE store_name = ?1 AND product_uuid = ?2
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(&self.store_name)
        .bind(key.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn unaltered_entries(
        &self,
        skip: usize,
        top: usize,
    ) -> KeyStoreResult<Vec<KeyStoreEntry>> {
        let rows = sqlx::query(
            "SELECT product_uuid, tag, value, created_at FROM keystore_entries
             WHERE store_name = ?1 AND tag = ?2
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?3 OFFSET ?4",
        )
        .bind(&self.store_name)
        .bind(crate::TAG_UNALTERED)
        .bind(top as i64)
        .bind(skip as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::entry_from_row).collect()
    }
}

/// Restart-safe current-size row for one datastore.
#[derive(Clone)]
pub struct UsageStore {
    pool: Pool<Sqlite>,
    store_name: String,
}

impl UsageStore {
    /// Load the persisted size; absent rows read as zero.
    pub async fn load(&self) -> KeyStoreResult<u64> {
        let size: Option<i64> =
            sqlx::query_scalar("SELECT current_size FROM datastore_usage WHERE store_name = ?1")
                .bind(&self.store_name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(size.map(|s| s.max(0) as u64).unwrap_or(0))
    }

    /// Persist the size.
    pub async fn save(&self, size: u64) -> KeyStoreResult<()> {
        sqlx::query(
            "INSERT INTO datastore_usage (store_name, current_size) VALUES (?1, ?2)
             ON CONFLICT (store_name) DO UPDATE SET current_size = excluded.current_size",
        )
        .bind(&self.store_name)
        .bind(size as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TAG_UNALTERED;

    #[tokio::test]
    async fn put_get_remove_roundtrip() {
        let db = KeyStoreDb::open_in_memory().await.unwrap();
        let store = db.keystore("hfs-1");
        let key = Uuid::new_v4();

        store.put(key, TAG_UNALTERED, "/x0/prod.zip").await.unwrap();
        assert!(store.exists(key, TAG_UNALTERED).await.unwrap());
        assert_eq!(
            store.get(key, TAG_UNALTERED).await.unwrap(),
            Some("/x0/prod.zip".to_string())
        );

        let removed = store.remove(key, TAG_UNALTERED).await.unwrap();
        assert_eq!(removed, Some("/x0/prod.zip".to_string()));
        assert!(!store.exists(key, TAG_UNALTERED).await.unwrap());
        assert!(store.remove(key, TAG_UNALTERED).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overwrite_keeps_single_entry() {
        let db = KeyStoreDb::open_in_memory().await.unwrap();
        let store = db.keystore("hfs-1");
        let key = Uuid::new_v4();

        store.put(key, TAG_UNALTERED, "v1").await.unwrap();
        store.put(key, TAG_UNALTERED, "v2").await.unwrap();

        assert_eq!(
            store.get(key, TAG_UNALTERED).await.unwrap(),
            Some("v2".to_string())
        );
        assert_eq!(store.entries_by_uuid(key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let db = KeyStoreDb::open_in_memory().await.unwrap();
        let a = db.keystore("store-a");
        let b = db.keystore("store-b");
        let key = Uuid::new_v4();

        a.put(key, TAG_UNALTERED, "in-a").await.unwrap();
        assert!(!b.exists(key, TAG_UNALTERED).await.unwrap());
    }

    #[tokio::test]
    async fn unaltered_pagination() {
        let db = KeyStoreDb::open_in_memory().await.unwrap();
        let store = db.keystore("hfs-1");

        let mut keys = Vec::new();
        for i in 0..5 {
            let key = Uuid::new_v4();
            store
                .put(key, TAG_UNALTERED, &format!("path-{i}"))
                .await
                .unwrap();
            store.put(key, "quicklook", "ignored").await.unwrap();
            keys.push(key);
        }

        let page = store.unaltered_entries(1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|e| e.tag == TAG_UNALTERED));

        let all = store.unaltered_entries(0, 100).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.db");
        let key = Uuid::new_v4();

        {
            let db = KeyStoreDb::open(&path).await.unwrap();
            db.keystore("hfs-1")
                .put(key, TAG_UNALTERED, "persisted")
                .await
                .unwrap();
            db.usage("hfs-1").save(4096).await.unwrap();
        }

        let db = KeyStoreDb::open(&path).await.unwrap();
        assert_eq!(
            db.keystore("hfs-1").get(key, TAG_UNALTERED).await.unwrap(),
            Some("persisted".to_string())
        );
        assert_eq!(db.usage("hfs-1").load().await.unwrap(), 4096);
    }

    #[tokio::test]
    async fn usage_defaults_to_zero() {
        let db = KeyStoreDb::open_in_memory().await.unwrap();
        assert_eq!(db.usage("missing").load().await.unwrap(), 0);
    }
}
