//! Key stores mapping (product uuid, tag) pairs to opaque physical
//! references.
//!
//! Two variants back the same trait:
//! - `PersistentKeyStore`: SQLite-backed, survives restarts; used by
//!   filesystem stores whose physical layout cannot be re-derived.
//! - `VolatileKeyStore`: insertion-ordered in-memory map; used by object
//!   stores that derive locations deterministically.
//!
//! The shared SQLite pool also persists per-datastore size accounting rows.

pub mod entry;
pub mod error;
pub mod persistent;
pub mod traits;
pub mod volatile;

pub use entry::KeyStoreEntry;
pub use error::{KeyStoreError, KeyStoreResult};
pub use persistent::{KeyStoreDb, PersistentKeyStore, UsageStore};
pub use traits::KeyStore;
pub use volatile::VolatileKeyStore;

/// Tag under which a product's pristine (as-ingested) physical reference is
/// recorded.
pub const TAG_UNALTERED: &str = "unaltered";
