//! Cleanup tests for image and collection removal, plus the orphan sweep.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use gallery_thumbnailer::{ArtifactLayout, ArtifactLifecycleManager};

use super::test_utils::{
    build_router, build_router_with, create_test_jpeg, get, send, TrackingStore,
};

async fn summer_gallery() -> TrackingStore {
    TrackingStore::new()
        .with_object("galleries/summer/photo.jpg", create_test_jpeg(800, 600))
        .await
        .with_object("galleries/summer/photo_1.jpg", create_test_jpeg(800, 600))
        .await
        .with_object("galleries/winter/photo.jpg", create_test_jpeg(800, 600))
        .await
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

// =============================================================================
// Image Removal
// =============================================================================

#[tokio::test]
async fn test_delete_image_removes_only_its_thumbnails() {
    let store = summer_gallery().await;
    let router = build_router(store.clone());

    for uri in [
        "/images/400x0/summer/photo.jpg",
        "/images/200x0/summer/photo.jpg",
        "/images/400x0/summer/photo_1.jpg",
        "/images/400x0/winter/photo.jpg",
    ] {
        let (status, _, _) = get(&router, uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
    }

    let (status, _, body) = send(&router, "DELETE", "/gallery/summer/photo.jpg").await;

    assert_eq!(status, StatusCode::OK);
    let report = json(&body);
    assert_eq!(report["image"], "summer/photo.jpg");
    assert_eq!(report["thumbnails_removed"], 2);
    assert_eq!(report["failures"], 0);
    assert_eq!(report["original_removed"], true);

    assert_eq!(
        store.keys().await,
        vec![
            "galleries/summer/photo_1.jpg".to_string(),
            "galleries/summer/thumbnails/photo_1_400x300.jpg".to_string(),
            "galleries/winter/photo.jpg".to_string(),
            "galleries/winter/thumbnails/photo_400x300.jpg".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_deleted_image_is_no_longer_served() {
    let store = summer_gallery().await;
    let router = build_router(store.clone());

    let (status, _, _) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::OK);

    send(&router, "DELETE", "/gallery/summer/photo.jpg").await;

    let (status, _, _) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = get(&router, "/images/200x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!store.contains("galleries/summer/thumbnails/photo_200x150.jpg").await);
}

#[tokio::test]
async fn test_delete_during_generation_leaves_no_thumbnail() {
    let store = summer_gallery()
        .await
        .with_write_delay(Duration::from_millis(200));
    let router = build_router_with(store.clone(), |service| {
        service.with_timeout(Some(Duration::from_millis(20)))
    });

    let (status, _, _) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    let (status, _, body) = send(&router, "DELETE", "/gallery/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["original_removed"], true);

    // Let the detached generation finish
    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert!(!store.contains("galleries/summer/thumbnails/photo_400x300.jpg").await);
    assert_eq!(
        store.keys().await,
        vec![
            "galleries/summer/photo_1.jpg".to_string(),
            "galleries/winter/photo.jpg".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failed_thumbnail_delete_does_not_block_original() {
    let store = summer_gallery()
        .await
        .with_object("galleries/summer/thumbnails/photo_400x300.jpg", vec![1])
        .await
        .with_object("galleries/summer/thumbnails/photo_200x150.jpg", vec![2])
        .await
        .with_failure("galleries/summer/thumbnails/photo_400x300.jpg")
        .await;
    let router = build_router(store.clone());

    let (status, _, body) = send(&router, "DELETE", "/gallery/summer/photo.jpg").await;

    assert_eq!(status, StatusCode::OK);
    let report = json(&body);
    assert_eq!(report["thumbnails_removed"], 1);
    assert_eq!(report["failures"], 1);
    assert_eq!(report["original_removed"], true);

    assert!(!store.contains("galleries/summer/photo.jpg").await);
    assert!(!store.contains("galleries/summer/thumbnails/photo_200x150.jpg").await);
    assert!(store.contains("galleries/summer/thumbnails/photo_400x300.jpg").await);
}

#[tokio::test]
async fn test_image_removed_outside_api_is_not_served() {
    let store = summer_gallery().await;
    let router = build_router(store.clone());

    let (status, _, _) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::OK);

    store.remove("galleries/summer/photo.jpg").await;

    let (status, _, body) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["error"], "not_found");

    // The stale record was dropped, other sizes fail the same way
    let (status, _, _) = get(&router, "/images/200x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_missing_image_is_idempotent() {
    let store = summer_gallery().await;
    let router = build_router(store.clone());

    let (status, _, body) = send(&router, "DELETE", "/gallery/summer/nothing.jpg").await;

    assert_eq!(status, StatusCode::OK);
    let report = json(&body);
    assert_eq!(report["thumbnails_removed"], 0);
    assert_eq!(report["original_removed"], false);
    assert_eq!(store.keys().await.len(), 3);
}

#[tokio::test]
async fn test_delete_image_rejects_traversal() {
    let router = build_router(summer_gallery().await);

    let (status, _, body) = send(&router, "DELETE", "/gallery/summer/..").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_request");
}

// =============================================================================
// Collection Removal
// =============================================================================

#[tokio::test]
async fn test_delete_collection_removes_directory_tree() {
    let store = summer_gallery().await;
    let router = build_router(store.clone());

    get(&router, "/images/400x0/summer/photo.jpg").await;
    get(&router, "/images/400x0/winter/photo.jpg").await;

    let (status, _, body) = send(&router, "DELETE", "/gallery/summer").await;

    assert_eq!(status, StatusCode::OK);
    let report = json(&body);
    assert_eq!(report["collection"], "summer");
    assert_eq!(report["removed"], 3);

    assert_eq!(
        store.keys().await,
        vec![
            "galleries/winter/photo.jpg".to_string(),
            "galleries/winter/thumbnails/photo_400x300.jpg".to_string(),
        ]
    );

    let (status, _, _) = get(&router, "/images/400x0/summer/photo.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_collection_with_similar_name_is_untouched() {
    let store = TrackingStore::new()
        .with_object("galleries/sum/a.jpg", create_test_jpeg(10, 10))
        .await
        .with_object("galleries/summer/b.jpg", create_test_jpeg(10, 10))
        .await;
    let router = build_router(store.clone());

    let (_, _, body) = send(&router, "DELETE", "/gallery/sum").await;

    assert_eq!(json(&body)["removed"], 1);
    assert!(store.contains("galleries/summer/b.jpg").await);
}

// =============================================================================
// Orphan Sweep
// =============================================================================

#[tokio::test]
async fn test_sweep_removes_orphans_left_by_external_deletes() {
    let store = summer_gallery().await;
    let router = build_router(store.clone());

    get(&router, "/images/400x0/summer/photo.jpg").await;
    get(&router, "/images/400x0/summer/photo_1.jpg").await;

    // Original removed behind the service's back
    store.remove("galleries/summer/photo.jpg").await;

    let manager = ArtifactLifecycleManager::new(Arc::new(store.clone()), ArtifactLayout::default());

    let report = manager.sweep(true).await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(
        report.orphaned,
        vec!["galleries/summer/thumbnails/photo_400x300.jpg".to_string()]
    );
    assert_eq!(report.removed, 0);
    assert!(store.contains("galleries/summer/thumbnails/photo_400x300.jpg").await);

    let report = manager.sweep(false).await.unwrap();
    assert_eq!(report.removed, 1);
    assert!(!store.contains("galleries/summer/thumbnails/photo_400x300.jpg").await);
    assert!(store.contains("galleries/summer/thumbnails/photo_1_400x300.jpg").await);
}
