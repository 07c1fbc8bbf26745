//! Configuration types shared across crates.
//!
//! These structures are supplied and persisted externally; hangar never
//! reads or writes configuration files itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Common configuration shared by every DataStore backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataStoreConf {
    /// Unique store name.
    pub name: String,
    /// Resolution priority; interpretation (lower- or higher-first) is
    /// decided by the manager's comparator.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Reject all mutating operations.
    #[serde(default)]
    pub read_only: bool,
    /// Maximum store size in bytes; -1 means unbounded.
    #[serde(default = "default_maximum_size")]
    pub maximum_size: i64,
    /// Evict oldest products to make room for incoming ones once
    /// `maximum_size` would be exceeded.
    #[serde(default)]
    pub auto_eviction: bool,
}

impl DataStoreConf {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: default_priority(),
            read_only: false,
            maximum_size: default_maximum_size(),
            auto_eviction: false,
        }
    }
}

/// Local filesystem (hierarchical file system) store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HfsConf {
    #[serde(flatten)]
    pub common: DataStoreConf,
    /// Root directory for product payloads.
    pub root: PathBuf,
    /// Maximum non-directory entries per allocated directory.
    #[serde(default = "default_max_items")]
    pub max_items: u64,
    /// Fan-out bound for the directory allocator; must be >= 2.
    #[serde(default = "default_max_occurrence")]
    pub max_occurrence: i64,
    /// Bounds for the auto-eviction pass.
    #[serde(default)]
    pub eviction: EvictionConf,
}

/// S3-compatible object storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectStorageConf {
    #[serde(flatten)]
    pub common: DataStoreConf,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (Swift/MinIO gateways).
    pub endpoint: Option<String>,
    /// Key prefix within the bucket.
    #[serde(default)]
    pub prefix: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Use path-style addressing (required by most non-AWS endpoints).
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
}

/// Asynchronous (order-based) remote archive configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteArchiveConf {
    #[serde(flatten)]
    pub common: DataStoreConf,
    /// Base URL of the archive's OData service.
    pub service_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Admission bound on orders not yet picked up by the archive.
    #[serde(default = "default_max_pending_requests")]
    pub max_pending_requests: usize,
    /// Admission bound on orders the archive is actively preparing.
    #[serde(default = "default_max_running_requests")]
    pub max_running_requests: usize,
    /// Seconds between polling passes over outstanding orders.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Only the manager instance of a cluster polls and downloads;
    /// non-managers may still inspect order state.
    #[serde(default = "default_is_manager")]
    pub is_manager: bool,
    /// Bounded resumption attempts per product download.
    #[serde(default = "default_max_download_attempts")]
    pub max_download_attempts: u32,
    /// Bounded attempts for transient order-submission failures.
    #[serde(default = "default_max_submit_attempts")]
    pub max_submit_attempts: u32,
}

/// Eviction pass configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvictionConf {
    /// Upper bound on products removed in one pass.
    #[serde(default = "default_max_evicted")]
    pub max_evicted: usize,
}

impl Default for EvictionConf {
    fn default() -> Self {
        Self {
            max_evicted: default_max_evicted(),
        }
    }
}

/// Ingestion pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConf {
    /// Number of worker tasks pulling from the fair queue.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Worker poll timeout in milliseconds; bounds shutdown latency.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for IngestConf {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

fn default_priority() -> i32 {
    100
}

fn default_maximum_size() -> i64 {
    -1
}

fn default_max_items() -> u64 {
    1024
}

fn default_max_occurrence() -> i64 {
    16
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_force_path_style() -> bool {
    true
}

fn default_max_pending_requests() -> usize {
    10
}

fn default_max_running_requests() -> usize {
    4
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_is_manager() -> bool {
    true
}

fn default_max_download_attempts() -> u32 {
    10
}

fn default_max_submit_attempts() -> u32 {
    3
}

fn default_max_evicted() -> usize {
    1000
}

fn default_worker_count() -> usize {
    4
}

fn default_poll_timeout_ms() -> u64 {
    200
}
