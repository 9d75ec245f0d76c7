//! Store-backed original image catalog.
//!
//! The catalog provides:
//! - LRU caching of original records so dimensions are read once
//! - Singleflight to prevent duplicate header reads for the same original
//! - Header-only dimension reads (no full decode)

use std::io::Cursor;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use image::ImageReader;
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CollectionRef, OriginalImage};
use crate::error::{GenerateError, ThumbnailError};
use crate::flight::SingleFlight;
use crate::store::CacheStore;
use crate::thumbnail::ArtifactLayout;

/// Default number of original records kept in memory.
pub const DEFAULT_ORIGINAL_CACHE_CAPACITY: usize = 1000;

// =============================================================================
// OriginalProvider Trait
// =============================================================================

/// Source of original image records.
///
/// Implementations look up an original by collection and file name and
/// report [`ThumbnailError::NotFound`] when it does not exist.
#[async_trait]
pub trait OriginalProvider: Send + Sync {
    /// Look up an original image.
    async fn get_original(
        &self,
        collection: &CollectionRef,
        filename: &str,
    ) -> Result<Arc<OriginalImage>, ThumbnailError>;

    /// Drop any cached record of an original that was removed.
    async fn forget(&self, _collection: &CollectionRef, _filename: &str) {}

    /// Drop any cached records of a removed collection.
    async fn forget_collection(&self, _collection: &CollectionRef) {}
}

// =============================================================================
// StoreCatalog
// =============================================================================

/// [`OriginalProvider`] reading originals from a [`CacheStore`].
///
/// Originals are immutable once ingested, so records never go stale while
/// the original exists; removal goes through [`OriginalProvider::forget`].
pub struct StoreCatalog<S: CacheStore + 'static> {
    /// Store holding the original bytes
    store: Arc<S>,

    /// Key layout
    layout: ArtifactLayout,

    /// Cached records indexed by storage key
    cache: RwLock<LruCache<String, Arc<OriginalImage>>>,

    /// In-flight header reads
    flights: SingleFlight<Arc<OriginalImage>>,
}

impl<S: CacheStore + 'static> StoreCatalog<S> {
    /// Create a catalog with the default record capacity.
    pub fn new(store: Arc<S>, layout: ArtifactLayout) -> Self {
        Self::with_capacity(store, layout, DEFAULT_ORIGINAL_CACHE_CAPACITY)
    }

    /// Create a catalog keeping at most `capacity` records in memory.
    pub fn with_capacity(store: Arc<S>, layout: ArtifactLayout, capacity: usize) -> Self {
        Self {
            store,
            layout,
            cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            flights: SingleFlight::new(),
        }
    }

    /// Get the number of cached records.
    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn load(
        store: Arc<S>,
        key: String,
        id: String,
        collection: CollectionRef,
    ) -> Result<Arc<OriginalImage>, ThumbnailError> {
        let bytes = store
            .open(&key)
            .await
            .map_err(|e| ThumbnailError::from_original_read(&key, e))?;

        let (width, height) = read_dimensions(&bytes).map_err(|e| e.with_path(&key))?;
        debug!(path = %key, width, height, "Loaded original");

        Ok(Arc::new(OriginalImage::new(
            id, key, width, height, collection,
        )?))
    }
}

#[async_trait]
impl<S: CacheStore + 'static> OriginalProvider for StoreCatalog<S> {
    async fn get_original(
        &self,
        collection: &CollectionRef,
        filename: &str,
    ) -> Result<Arc<OriginalImage>, ThumbnailError> {
        let key = self.layout.original_key(collection, filename)?;

        // Fast path: check cache
        {
            let mut cache = self.cache.write().await;
            if let Some(original) = cache.get(&key) {
                return Ok(original.clone());
            }
        }

        let id = format!("{}/{}", collection.name(), filename);
        let original = self
            .flights
            .run(
                &key,
                Self::load(
                    Arc::clone(&self.store),
                    key.clone(),
                    id,
                    collection.clone(),
                ),
            )
            .await?;

        let mut cache = self.cache.write().await;
        cache.put(key, original.clone());
        Ok(original)
    }

    async fn forget(&self, collection: &CollectionRef, filename: &str) {
        if let Ok(key) = self.layout.original_key(collection, filename) {
            self.cache.write().await.pop(&key);
        }
    }

    async fn forget_collection(&self, collection: &CollectionRef) {
        let prefix = self.layout.collection_prefix(collection);
        let mut cache = self.cache.write().await;
        let stale: Vec<String> = cache
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }
}

/// Read the pixel dimensions from an image header.
pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32), GenerateError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| GenerateError::Decode(e.to_string()))?;

    if reader.format().is_none() {
        return Err(GenerateError::Decode("unrecognized image format".to_string()));
    }

    reader
        .into_dimensions()
        .map_err(|e| GenerateError::Decode(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
