//! Product ingestion: fair work queue and worker-pool pipeline.
//!
//! Scanners submit discovered payloads keyed by source; a round-robin
//! queue keeps sources fair while a pool of workers checksums each payload
//! and places it through the store manager.

pub mod error;
pub mod pipeline;
pub mod queue;

pub use error::{IngestError, IngestResult};
pub use pipeline::{DiscoveredItem, Ingester};
pub use queue::{FairTaskQueue, UNKNOWN_PARTITION};
