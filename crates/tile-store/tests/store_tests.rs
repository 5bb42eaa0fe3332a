//! Integration tests for the on-disk tile store.

use std::sync::Arc;

use test_utils::{temp_cache_dir, tile_payload};
use tile_common::TileCoord;
use tile_store::TileStore;

#[tokio::test]
async fn test_stats_per_source() {
    let dir = temp_cache_dir();
    let store = TileStore::new(dir.path());

    store
        .write("esri-satellite", &TileCoord::new(3, 4, 2), b"abcd")
        .await
        .unwrap();
    store
        .write("esri-satellite", &TileCoord::new(3, 4, 3), b"ef")
        .await
        .unwrap();
    store
        .write("google-satellite", &TileCoord::new(0, 0, 0), b"g")
        .await
        .unwrap();

    let stats = store.stats(None).await.unwrap();
    assert_eq!(stats.sources.len(), 2);
    assert_eq!(stats.sources["esri-satellite"].tiles, 2);
    assert_eq!(stats.sources["esri-satellite"].bytes, 6);
    assert_eq!(stats.sources["google-satellite"].tiles, 1);
    assert_eq!(stats.total_tiles(), 3);
    assert_eq!(stats.total_bytes(), 7);

    let esri_only = store.stats(Some("esri-satellite")).await.unwrap();
    assert_eq!(esri_only.sources.len(), 1);
    assert_eq!(esri_only.total_tiles(), 2);
}

#[tokio::test]
async fn test_stats_on_missing_root_is_empty() {
    let dir = temp_cache_dir();
    let store = TileStore::new(dir.path().join("never-created"));
    let stats = store.stats(None).await.unwrap();
    assert!(stats.is_empty());
}

#[tokio::test]
async fn test_list_cached_is_sorted_and_limited() {
    let dir = temp_cache_dir();
    let store = TileStore::new(dir.path());

    for (x, y) in [(9, 3), (2, 7), (2, 1), (5, 5)] {
        let coord = TileCoord::new(4, x, y);
        store
            .write("esri-satellite", &coord, &tile_payload(4, x, y))
            .await
            .unwrap();
    }
    // Another zoom must not leak into the listing
    store
        .write("esri-satellite", &TileCoord::new(5, 1, 1), b"z5")
        .await
        .unwrap();

    let all = store.list_cached("esri-satellite", 4, 100).await.unwrap();
    assert_eq!(
        all,
        vec![
            TileCoord::new(4, 2, 1),
            TileCoord::new(4, 2, 7),
            TileCoord::new(4, 5, 5),
            TileCoord::new(4, 9, 3),
        ]
    );

    let two = store.list_cached("esri-satellite", 4, 2).await.unwrap();
    assert_eq!(two.len(), 2);

    let none = store.list_cached("google-satellite", 4, 10).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_concurrent_writes_same_tile() {
    let dir = temp_cache_dir();
    let store = Arc::new(TileStore::new(dir.path()));
    let coord = TileCoord::new(6, 31, 21);

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.write("osm", &coord, &[i; 32]).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Exactly one complete payload survives
    let data = store.read("osm", &coord).await.unwrap();
    assert_eq!(data.len(), 32);
    assert!(data.iter().all(|b| *b == data[0]));
    assert_eq!(store.stats(Some("osm")).await.unwrap().total_tiles(), 1);
}
