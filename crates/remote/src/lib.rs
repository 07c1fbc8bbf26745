//! Asynchronous (order-based) remote archive access.
//!
//! Long-term-archive stores do not serve product bytes immediately: a
//! retrieval is an *order* that the archive prepares over minutes to hours.
//! This crate provides:
//! - The `RemoteArchive` protocol contract and its OData-over-HTTP client
//! - `AsyncDataStore`: a `DataStore` fronting a local cache with a
//!   submit → poll → download state machine and bounded admission
//! - `ProductDownloadTask`: resumable ranged downloads over an in-process
//!   pipe
//! - `HttpCatalogStore`: a read-only `DataStore` over a remote catalog

pub mod catalog;
pub mod client;
pub mod download;
pub mod error;
pub mod store;

pub use catalog::HttpCatalogStore;
pub use client::{FetchResponse, ODataArchiveClient, RemoteArchive, RemoteJob, RemoteProductMeta};
pub use download::ProductDownloadTask;
pub use error::{RemoteError, RemoteResult};
pub use store::AsyncDataStore;
