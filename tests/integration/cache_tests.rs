//! Durable cache behavior tests.
//!
//! These tests verify that:
//! - A thumbnail is generated once and served from storage afterwards
//! - Concurrent misses for the same thumbnail share one generation
//! - A timed-out request does not abort publication
//! - Local writes never leave partial files behind

use std::time::Duration;

use axum::http::StatusCode;
use tempfile::TempDir;

use gallery_thumbnailer::LocalFsStore;

use super::test_utils::{
    build_router, build_router_with, create_test_jpeg, get, header, TrackingStore,
};

const ORIGINAL_KEY: &str = "galleries/summer/photo.jpg";
const THUMB_KEY: &str = "galleries/summer/thumbnails/photo_400x300.jpg";

#[tokio::test]
async fn test_repeated_requests_generate_once() {
    let store = TrackingStore::new()
        .with_object(ORIGINAL_KEY, create_test_jpeg(800, 600))
        .await;
    let router = build_router(store.clone());

    for _ in 0..5 {
        let (status, _, _) = get(&router, "/images/400x0/summer/photo.jpg").await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(store.write_count(THUMB_KEY).await, 1);
    assert_eq!(store.total_writes().await, 1);
}

#[tokio::test]
async fn test_equivalent_requests_share_artifact() {
    let store = TrackingStore::new()
        .with_object(ORIGINAL_KEY, create_test_jpeg(800, 600))
        .await;
    let router = build_router(store.clone());

    // All three resolve to 400x300
    for uri in [
        "/images/400x0/summer/photo.jpg",
        "/images/0x300/summer/photo.jpg",
        "/images/400x300/summer/photo.jpg",
    ] {
        let (status, headers, _) = get(&router, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header(&headers, "x-thumbnail-size"), "400x300");
    }

    assert_eq!(store.write_count(THUMB_KEY).await, 1);
}

#[tokio::test]
async fn test_distinct_sizes_get_distinct_keys() {
    let store = TrackingStore::new()
        .with_object(ORIGINAL_KEY, create_test_jpeg(800, 600))
        .await;
    let router = build_router(store.clone());

    get(&router, "/images/400x0/summer/photo.jpg").await;
    get(&router, "/images/200x0/summer/photo.jpg").await;
    get(&router, "/images/100x100/summer/photo.jpg").await;

    assert_eq!(
        store.keys().await,
        vec![
            "galleries/summer/photo.jpg".to_string(),
            "galleries/summer/thumbnails/photo_100x100.jpg".to_string(),
            "galleries/summer/thumbnails/photo_200x150.jpg".to_string(),
            "galleries/summer/thumbnails/photo_400x300.jpg".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_concurrent_misses_generate_once() {
    let store = TrackingStore::new()
        .with_write_delay(Duration::from_millis(50))
        .with_object(ORIGINAL_KEY, create_test_jpeg(800, 600))
        .await;
    let router = build_router(store.clone());

    let mut handles = Vec::new();
    for _ in 0..50 {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            get(&router, "/images/400x0/summer/photo.jpg").await
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        let (status, _, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        bodies.push(body);
    }

    assert_eq!(store.write_count(THUMB_KEY).await, 1);
    assert!(bodies.iter().all(|body| body == &bodies[0]));
}

#[tokio::test]
async fn test_timeout_still_publishes_thumbnail() {
    let store = TrackingStore::new()
        .with_write_delay(Duration::from_millis(200))
        .with_object(ORIGINAL_KEY, create_test_jpeg(800, 600))
        .await;
    let router = build_router_with(store.clone(), |service| {
        service.with_timeout(Some(Duration::from_millis(20)))
    });

    let (status, _, body) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "timeout");

    // Generation keeps running after the caller gave up
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(store.contains(THUMB_KEY).await);

    let (status, headers, _) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-thumbnail-cache-hit"), "true");
    assert_eq!(store.write_count(THUMB_KEY).await, 1);
}

#[tokio::test]
async fn test_regenerates_after_thumbnail_removed() {
    let store = TrackingStore::new()
        .with_object(ORIGINAL_KEY, create_test_jpeg(800, 600))
        .await;
    let router = build_router(store.clone());

    get(&router, "/images/400x0/summer/photo.jpg").await;
    store.remove(THUMB_KEY).await;

    let (status, headers, _) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-thumbnail-cache-hit"), "false");
    assert_eq!(store.write_count(THUMB_KEY).await, 2);
}

#[tokio::test]
async fn test_local_store_publishes_without_temp_files() {
    let dir = TempDir::new().unwrap();
    let gallery = dir.path().join("galleries/summer");
    std::fs::create_dir_all(&gallery).unwrap();
    std::fs::write(gallery.join("photo.jpg"), create_test_jpeg(800, 600)).unwrap();

    let router = build_router(LocalFsStore::new(dir.path()));

    let mut handles = Vec::new();
    for size in ["400x0", "200x0", "400x0", "0x300"] {
        let router = router.clone();
        let uri = format!("/images/{}/summer/photo.jpg", size);
        handles.push(tokio::spawn(async move { get(&router, &uri).await }));
    }
    for handle in handles {
        let (status, _, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let mut names: Vec<String> = std::fs::read_dir(gallery.join("thumbnails"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["photo_200x150.jpg", "photo_400x300.jpg"]);

    let on_disk = std::fs::read(gallery.join("thumbnails/photo_400x300.jpg")).unwrap();
    let (_, _, served) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(served.as_ref(), on_disk.as_slice());
}

#[tokio::test]
async fn test_shared_store_counts_reads() {
    let store = TrackingStore::new()
        .with_object(ORIGINAL_KEY, create_test_jpeg(800, 600))
        .await;
    let router = build_router(store.clone());

    get(&router, "/images/400x0/summer/photo.jpg").await;
    let after_first = store.open_count();
    get(&router, "/images/400x0/summer/photo.jpg").await;

    // Original metadata is cached; a hit only reads the thumbnail
    assert_eq!(store.open_count(), after_first + 1);
}

#[tokio::test]
async fn test_failed_publish_is_storage_error() {
    let store = TrackingStore::new()
        .with_object(ORIGINAL_KEY, create_test_jpeg(800, 600))
        .await
        .with_failure(THUMB_KEY)
        .await;
    let router = build_router(store.clone());

    let (status, _, body) = get(&router, "/images/400x0/summer/photo.jpg").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "storage_error");
    assert_eq!(store.write_count(THUMB_KEY).await, 1);
    assert!(!store.contains(THUMB_KEY).await);
}
