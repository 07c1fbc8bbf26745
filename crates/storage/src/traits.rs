//! DataStore trait definition.

use crate::error::DataStoreResult;
use async_trait::async_trait;
use hangar_core::Product;
use uuid::Uuid;

/// A named backend capable of storing and retrieving product byte content.
///
/// All mutating operations on a read-only store fail with a read-only
/// error; backends that cannot relocate products fail `move_in` explicitly
/// rather than silently copying.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    /// Unique store name.
    fn name(&self) -> &str;

    /// Resolution priority; direction is decided by the manager's
    /// comparator.
    fn priority(&self) -> i32;

    fn read_only(&self) -> bool;

    /// Retrieve a product.
    async fn get(&self, uuid: Uuid) -> DataStoreResult<Product>;

    /// Store a product's content, leaving the source untouched.
    async fn set(&self, product: &Product) -> DataStoreResult<()>;

    /// Store a product's content and consume the source (relocation).
    async fn move_in(&self, product: Product) -> DataStoreResult<()>;

    /// Delete a product's content.
    async fn delete(&self, uuid: Uuid) -> DataStoreResult<()>;

    /// Whether this store knows the product.
    async fn exists(&self, uuid: Uuid) -> DataStoreResult<bool>;

    /// Whether the product's bytes are physically present right now.
    ///
    /// Differs from `exists` for stores that track products whose content
    /// is remote or pending retrieval.
    async fn has_product(&self, uuid: Uuid) -> DataStoreResult<bool>;

    /// Bytes currently attributed to this store.
    async fn current_size(&self) -> DataStoreResult<u64>;
}
