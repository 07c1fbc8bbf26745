//! Core domain types and shared logic for the hangar product store.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Products and their content representations
//! - Checksums
//! - Asynchronous fetch orders and their lifecycle
//! - DataStore, archive, and ingestion configuration
//! - Product change events

pub mod config;
pub mod error;
pub mod events;
pub mod order;
pub mod product;

pub use config::{
    DataStoreConf, EvictionConf, HfsConf, IngestConf, ObjectStorageConf, RemoteArchiveConf,
};
pub use error::{CoreError, Result};
pub use events::{EventBus, ProductEvent};
pub use order::{Order, OrderStatus};
pub use product::{Checksum, Product, ProductContent};
