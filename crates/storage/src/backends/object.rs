//! S3-compatible object storage data store.

use crate::error::{DataStoreError, DataStoreResult};
use crate::traits::DataStore;
use crate::usage::SizeAccounting;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use hangar_core::{ObjectStorageConf, Product, ProductContent};
use hangar_keystore::{KeyStore, TAG_UNALTERED, VolatileKeyStore};
use tracing::instrument;
use uuid::Uuid;

/// Data store persisting product payloads as objects in an S3-compatible
/// bucket.
///
/// Object keys are derived deterministically from the product uuid, so the
/// keystore is volatile: after a restart, presence is re-established from
/// the bucket itself. Size accounting is likewise in-memory only and
/// rebuilt as products flow through.
pub struct ObjectDataStore {
    conf: ObjectStorageConf,
    client: Client,
    keystore: VolatileKeyStore,
    accounting: SizeAccounting,
}

impl ObjectDataStore {
    pub async fn new(conf: ObjectStorageConf) -> DataStoreResult<Self> {
        let credentials = Credentials::new(
            conf.access_key_id.clone(),
            conf.secret_access_key.clone(),
            None,
            None,
            "hangar-static",
        );
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(conf.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(conf.force_path_style);
        if let Some(endpoint) = &conf.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }
        let client = Client::from_conf(builder.build());

        let accounting =
            SizeAccounting::new(&conf.common.name, conf.common.maximum_size, None).await?;
        Ok(Self {
            conf,
            client,
            keystore: VolatileKeyStore::new(),
            accounting,
        })
    }

    /// Deterministic object key for a product.
    fn object_key(&self, uuid: Uuid) -> String {
        format!("{}{}", self.conf.prefix, uuid)
    }

    fn check_writable(&self) -> DataStoreResult<()> {
        if self.conf.common.read_only {
            return Err(DataStoreError::ReadOnly(self.conf.common.name.clone()));
        }
        Ok(())
    }

    async fn head_size(&self, uuid: Uuid) -> DataStoreResult<Option<u64>> {
        let result = self
            .client
            .head_object()
            .bucket(&self.conf.bucket)
            .key(self.object_key(uuid))
            .send()
            .await;
        match result {
            Ok(head) => Ok(head.content_length().map(|l| l.max(0) as u64)),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(DataStoreError::Object(Box::new(service_err)))
                }
            }
        }
    }
}

#[async_trait]
impl DataStore for ObjectDataStore {
    fn name(&self) -> &str {
        &self.conf.common.name
    }

    fn priority(&self) -> i32 {
        self.conf.common.priority
    }

    fn read_only(&self) -> bool {
        self.conf.common.read_only
    }

    #[instrument(skip(self), fields(store = %self.conf.common.name))]
    async fn get(&self, uuid: Uuid) -> DataStoreResult<Product> {
        let result = self
            .client
            .get_object()
            .bucket(&self.conf.bucket)
            .key(self.object_key(uuid))
            .send()
            .await;
        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let service_err = err.into_service_error();
                return if service_err.is_no_such_key() {
                    Err(DataStoreError::ProductNotFound(uuid))
                } else {
                    Err(DataStoreError::Object(Box::new(service_err)))
                };
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| DataStoreError::Object(Box::new(e)))?
            .into_bytes();
        Ok(Product::from_bytes(uuid, uuid.to_string(), data))
    }

    #[instrument(skip(self, product), fields(store = %self.conf.common.name, product = %product.uuid()))]
    async fn set(&self, product: &Product) -> DataStoreResult<()> {
        self.check_writable()?;

        let uuid = product.uuid();
        let size = product.size();
        if !self.accounting.fits(size).await {
            return Err(DataStoreError::InsufficientSpace {
                store: self.conf.common.name.clone(),
                needed: size,
                available: self.accounting.available().await.unwrap_or(0),
            });
        }

        let body = match product.content() {
            ProductContent::Bytes(data) => ByteStream::from(data.clone()),
            ProductContent::File(path) => ByteStream::from_path(path)
                .await
                .map_err(|e| DataStoreError::Object(Box::new(e)))?,
        };

        let key = self.object_key(uuid);
        self.client
            .put_object()
            .bucket(&self.conf.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| DataStoreError::Object(Box::new(e.into_service_error())))?;

        self.keystore.put(uuid, TAG_UNALTERED, &key).await?;
        self.accounting.add(size).await?;
        Ok(())
    }

    /// Object storage cannot relocate a local payload in place; the caller
    /// keeps responsibility for the source, so this fails explicitly.
    async fn move_in(&self, product: Product) -> DataStoreResult<()> {
        let _ = product;
        Err(DataStoreError::Unsupported {
            store: self.conf.common.name.clone(),
            operation: "move_in",
        })
    }

    #[instrument(skip(self), fields(store = %self.conf.common.name))]
    async fn delete(&self, uuid: Uuid) -> DataStoreResult<()> {
        self.check_writable()?;

        let size = self.head_size(uuid).await?;
        if size.is_none() && self.keystore.remove(uuid, TAG_UNALTERED).await?.is_none() {
            return Err(DataStoreError::ProductNotFound(uuid));
        }

        self.client
            .delete_object()
            .bucket(&self.conf.bucket)
            .key(self.object_key(uuid))
            .send()
            .await
            .map_err(|e| DataStoreError::Object(Box::new(e.into_service_error())))?;

        self.keystore.remove(uuid, TAG_UNALTERED).await?;
        if let Some(size) = size {
            self.accounting.sub(size).await?;
        }
        Ok(())
    }

    async fn exists(&self, uuid: Uuid) -> DataStoreResult<bool> {
        // The volatile keystore empties on restart; fall through to the
        // bucket so existing objects are still found.
        if self.keystore.exists(uuid, TAG_UNALTERED).await? {
            return Ok(true);
        }
        Ok(self.head_size(uuid).await?.is_some())
    }

    async fn has_product(&self, uuid: Uuid) -> DataStoreResult<bool> {
        Ok(self.head_size(uuid).await?.is_some())
    }

    async fn current_size(&self) -> DataStoreResult<u64> {
        Ok(self.accounting.current().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hangar_core::DataStoreConf;

    fn conf(prefix: &str) -> ObjectStorageConf {
        ObjectStorageConf {
            common: DataStoreConf::new("object-1"),
            bucket: "products".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            prefix: prefix.to_string(),
            access_key_id: "test".to_string(),
            secret_access_key: "test".to_string(),
            force_path_style: true,
        }
    }

    #[tokio::test]
    async fn object_keys_are_deterministic() {
        let store = ObjectDataStore::new(conf("hangar/")).await.unwrap();
        let uuid = Uuid::new_v4();
        assert_eq!(store.object_key(uuid), format!("hangar/{uuid}"));
        assert_eq!(store.object_key(uuid), store.object_key(uuid));
    }

    #[tokio::test]
    async fn read_only_store_rejects_writes() {
        let mut conf = conf("");
        conf.common.read_only = true;
        let store = ObjectDataStore::new(conf).await.unwrap();

        let product = Product::from_bytes(Uuid::new_v4(), "p", Bytes::from_static(b"x"));
        assert!(matches!(
            store.set(&product).await,
            Err(DataStoreError::ReadOnly(_))
        ));
        assert!(matches!(
            store.delete(product.uuid()).await,
            Err(DataStoreError::ReadOnly(_))
        ));
    }
}
