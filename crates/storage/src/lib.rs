//! DataStore abstraction and backends for hangar.
//!
//! This crate provides:
//! - The `DataStore` trait and the prioritized `DataStoreManager`
//! - Local filesystem storage with hierarchical directory allocation
//! - S3-compatible object storage
//! - Restart-safe per-store size accounting
//! - Oldest-first eviction

pub mod backends;
pub mod error;
pub mod eviction;
pub mod hierarchy;
pub mod manager;
pub mod traits;
pub mod usage;

pub use backends::{hfs::HfsDataStore, object::ObjectDataStore};
pub use error::{DataStoreError, DataStoreResult};
pub use eviction::{Evictor, free_space};
pub use hierarchy::{HierarchicalDirectoryAllocator, hierarchical_path};
pub use manager::{DataStoreManager, PriorityOrder};
pub use traits::DataStore;
pub use usage::SizeAccounting;
