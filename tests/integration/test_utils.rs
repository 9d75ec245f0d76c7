//! Test utilities for integration tests.
//!
//! This module provides an instrumented in-memory store and helpers for
//! building test images and routers.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceExt;

use gallery_thumbnailer::{
    create_router, AppState, ArtifactLayout, ArtifactLifecycleManager, CacheStore, RouterConfig,
    StorageError, StoreCatalog, ThumbnailService,
};

// =============================================================================
// Tracking Store
// =============================================================================

/// In-memory [`CacheStore`] that counts operations.
///
/// Clones share the same objects and counters, so a test can keep a handle
/// while the service owns another.
#[derive(Clone, Default)]
pub struct TrackingStore {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    writes: Arc<RwLock<HashMap<String, usize>>>,
    open_count: Arc<AtomicUsize>,
    failing: Arc<RwLock<HashSet<String>>>,
    write_delay: Option<Duration>,
}

impl TrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `write_atomic` to simulate slow storage.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Add an object directly, bypassing the counters.
    pub async fn with_object(self, key: &str, data: Vec<u8>) -> Self {
        self.objects
            .write()
            .await
            .insert(key.to_string(), Bytes::from(data));
        self
    }

    /// Make `write_atomic` and `delete` fail for `key`.
    pub async fn with_failure(self, key: &str) -> Self {
        self.failing.write().await.insert(key.to_string());
        self
    }

    async fn check_failure(&self, key: &str) -> Result<(), StorageError> {
        if self.failing.read().await.contains(key) {
            return Err(StorageError::Io(format!("{}: permission denied", key)));
        }
        Ok(())
    }

    /// Number of `write_atomic` calls for `key`.
    pub async fn write_count(&self, key: &str) -> usize {
        self.writes.read().await.get(key).copied().unwrap_or(0)
    }

    /// Number of `write_atomic` calls for any key.
    pub async fn total_writes(&self) -> usize {
        self.writes.read().await.values().sum()
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn remove(&self, key: &str) {
        self.objects.write().await.remove(key);
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheStore for TrackingStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn open(&self, key: &str) -> Result<Bytes, StorageError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn ensure_directory(&self, _prefix: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn write_atomic(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        *self.writes.write().await.entry(key.to_string()).or_insert(0) += 1;
        self.check_failure(key).await?;
        self.objects.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check_failure(key).await?;
        self.objects
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|key, _| !key.starts_with(prefix));
        Ok(before - objects.len())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn identifier(&self) -> &str {
        "memory://tracking"
    }
}

// =============================================================================
// Router Helpers
// =============================================================================

/// Build a router over `store` with the default layout.
pub fn build_router<S: CacheStore + 'static>(store: S) -> Router {
    build_router_with(store, |service| service)
}

/// Build a router, letting the caller customize the thumbnail service.
pub fn build_router_with<S, F>(store: S, configure: F) -> Router
where
    S: CacheStore + 'static,
    F: FnOnce(ThumbnailService<S>) -> ThumbnailService<S>,
{
    let store = Arc::new(store);
    let layout = ArtifactLayout::default();
    let service = configure(ThumbnailService::with_shared_store(Arc::clone(&store)));
    let catalog = StoreCatalog::new(Arc::clone(&store), layout.clone());
    let lifecycle = ArtifactLifecycleManager::new(store, layout);

    let state = AppState::new(Arc::new(service), Arc::new(catalog), Arc::new(lifecycle));
    create_router(state, RouterConfig::new().with_tracing(false))
}

/// Send a request and collect the response.
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
) -> (StatusCode, HeaderMap, Bytes) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

/// `GET` a URI.
pub async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    send(router, "GET", uri).await
}

/// Read a header as a string.
pub fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
}

// =============================================================================
// Image Helpers
// =============================================================================

/// Create a JPEG with a gradient pattern.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 90);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Create a PNG with an alpha channel.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, 0, (y % 256) as u8, 200])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Check if data is a valid JPEG (SOI and EOI markers).
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4
        && data[0] == 0xFF
        && data[1] == 0xD8
        && data[data.len() - 2] == 0xFF
        && data[data.len() - 1] == 0xD9
}

/// Decode an image and return its dimensions.
pub fn image_dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}
