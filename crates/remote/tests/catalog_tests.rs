//! HttpCatalogStore behavior over a scripted archive.

mod common;

use common::ScriptedArchive;
use hangar_core::{DataStoreConf, ProductContent};
use hangar_remote::HttpCatalogStore;
use hangar_storage::{DataStore, DataStoreError};
use std::sync::Arc;
use uuid::Uuid;

fn fixture() -> (HttpCatalogStore, Arc<ScriptedArchive>) {
    let archive = Arc::new(ScriptedArchive::new());
    let store = HttpCatalogStore::new(
        DataStoreConf::new("catalog"),
        Arc::clone(&archive) as Arc<dyn hangar_remote::RemoteArchive>,
        5,
    );
    (store, archive)
}

#[tokio::test]
async fn get_returns_owned_in_memory_content() {
    let (store, archive) = fixture();
    let uuid = Uuid::new_v4();
    let data: Vec<u8> = (0..3000).map(|i| (i % 251) as u8).collect();
    archive.add_product(uuid, "S1A_scene.zip", &data);

    let product = store.get(uuid).await.unwrap();
    assert_eq!(product.name(), "S1A_scene.zip");
    assert_eq!(product.size(), data.len() as u64);
    let ProductContent::Bytes(bytes) = product.content() else {
        panic!("catalog content should be in memory");
    };
    assert_eq!(bytes, data.as_slice());

    // No staging is left behind under the system temp directory.
    let staged = std::env::temp_dir().join(format!("hangar-fetch-{uuid}"));
    assert!(!staged.exists());
}

#[tokio::test]
async fn get_survives_a_mid_stream_interruption() {
    let (store, archive) = fixture();
    let uuid = Uuid::new_v4();
    let data: Vec<u8> = (0..3000).map(|i| (i % 251) as u8).collect();
    archive.add_product(uuid, "S1A_scene.zip", &data);
    archive.cut_after(&[1000]);

    let product = store.get(uuid).await.unwrap();
    assert_eq!(product.size(), data.len() as u64);
    let offsets = archive.fetch_offsets.lock().unwrap().clone();
    assert_eq!(offsets, vec![0, 1000]);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let (store, _archive) = fixture();
    let uuid = Uuid::new_v4();

    assert!(matches!(
        store.get(uuid).await,
        Err(DataStoreError::ProductNotFound(_))
    ));
    assert!(!store.exists(uuid).await.unwrap());
}

#[tokio::test]
async fn mutations_are_rejected_as_read_only() {
    let (store, archive) = fixture();
    let uuid = Uuid::new_v4();
    archive.add_product(uuid, "scene.zip", b"payload");

    let product =
        hangar_core::Product::from_bytes(uuid, "scene.zip", bytes::Bytes::from_static(b"x"));
    assert!(matches!(
        store.set(&product).await.unwrap_err(),
        DataStoreError::ReadOnly(_)
    ));
    assert!(matches!(
        store.move_in(product).await.unwrap_err(),
        DataStoreError::ReadOnly(_)
    ));
    assert!(matches!(
        store.delete(uuid).await.unwrap_err(),
        DataStoreError::ReadOnly(_)
    ));
    assert!(store.exists(uuid).await.unwrap());
    assert!(!store.has_product(uuid).await.unwrap());
}
