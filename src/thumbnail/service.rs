//! Thumbnail Service for orchestrating thumbnail generation.
//!
//! The ThumbnailService is the main entry point for thumbnail requests. It
//! orchestrates:
//! - Dimension resolution
//! - Artifact key derivation
//! - Cache lookups against the durable store
//! - Generation and atomic publication on a miss
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ThumbnailService                          │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                   get_thumbnail()                       │    │
//! │  │  1. Resolve dims      4. Miss: single-flight generate   │    │
//! │  │  2. Build key         5. write_atomic                   │    │
//! │  │  3. exists? -> open   6. open & return                  │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │           │
//! │           ▼                    ▼                    ▼           │
//! │    ┌──────────────┐    ┌──────────────┐   ┌──────────────────┐  │
//! │    │ArtifactLayout│    │  CacheStore  │   │ThumbnailGenerator│  │
//! │    └──────────────┘    └──────────────┘   └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A cache hit never mutates storage. Concurrent misses for the same key
//! share one generation, which runs in a detached task: a caller hitting its
//! timeout gets [`ThumbnailError::Timeout`] while the artifact is still
//! published for later requests.
//!
//! A generation that publishes after its original was removed deletes the
//! artifact again. Together with the second listing pass in
//! [`ArtifactLifecycleManager::remove_path`](super::ArtifactLifecycleManager::remove_path)
//! this keeps removed images free of thumbnails.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{GenerateError, StorageError, ThumbnailError};
use crate::flight::SingleFlight;
use crate::original::OriginalImage;
use crate::store::{content_type_for, CacheStore};

use super::dimensions::{resolve_dimensions, ResolvedDimensions, ThumbnailRequest};
use super::generator::{output_format, ThumbnailGenerator};
use super::key::{ArtifactKey, ArtifactLayout};

// =============================================================================
// Thumbnail Response
// =============================================================================

/// Response from the thumbnail service.
#[derive(Debug, Clone)]
pub struct ThumbnailResponse {
    /// The encoded thumbnail
    pub data: Bytes,

    /// MIME type sniffed from the data, falling back to the key's extension
    pub content_type: &'static str,

    /// Where the artifact is stored
    pub key: ArtifactKey,

    /// Actual thumbnail size
    pub dimensions: ResolvedDimensions,

    /// Whether the artifact already existed in the store
    pub cache_hit: bool,
}

// =============================================================================
// Thumbnail Service
// =============================================================================

/// Service for generating and caching thumbnails.
///
/// # Type Parameters
///
/// * `S` - The cache store backend
///
/// # Example
///
/// ```ignore
/// use gallery_thumbnailer::store::LocalFsStore;
/// use gallery_thumbnailer::thumbnail::{ThumbnailRequest, ThumbnailService};
///
/// let service = ThumbnailService::new(LocalFsStore::new("/srv/media"));
///
/// let request = ThumbnailRequest::new(400, 0)?;
/// let response = service.get_thumbnail(&original, request).await?;
///
/// println!("{} ({} bytes, cache hit: {})", response.key, response.data.len(), response.cache_hit);
/// ```
pub struct ThumbnailService<S: CacheStore + 'static> {
    /// Durable artifact store, also holding the originals
    store: Arc<S>,

    /// Key layout
    layout: ArtifactLayout,

    /// Decode/resize/encode
    generator: ThumbnailGenerator,

    /// In-flight generations by artifact key
    flights: SingleFlight<Bytes>,

    /// Deadline for a whole `get_thumbnail` call
    timeout: Option<Duration>,
}

impl<S: CacheStore + 'static> ThumbnailService<S> {
    /// Create a new thumbnail service with the default layout and no timeout.
    pub fn new(store: S) -> Self {
        Self::with_shared_store(Arc::new(store))
    }

    /// Create a new thumbnail service with a shared store.
    ///
    /// This allows the catalog and the lifecycle manager to use the same store.
    pub fn with_shared_store(store: Arc<S>) -> Self {
        Self {
            store,
            layout: ArtifactLayout::default(),
            generator: ThumbnailGenerator::new(),
            flights: SingleFlight::new(),
            timeout: None,
        }
    }

    /// Use a custom key layout.
    pub fn with_layout(mut self, layout: ArtifactLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Use a custom generator (e.g. a different JPEG quality).
    pub fn with_generator(mut self, generator: ThumbnailGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Bound every `get_thumbnail` call. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the key layout.
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Get the configured timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Get a thumbnail, generating and caching it on a miss.
    ///
    /// # Errors
    ///
    /// - [`ThumbnailError::NotFound`] if the original bytes are gone
    /// - [`ThumbnailError::DecodeError`] if the original is not a valid image
    /// - [`ThumbnailError::Storage`] on backend failures
    /// - [`ThumbnailError::Timeout`] if the configured timeout elapses
    pub async fn get_thumbnail(
        &self,
        original: &OriginalImage,
        request: ThumbnailRequest,
    ) -> Result<ThumbnailResponse, ThumbnailError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.serve(original, request))
                .await
                .map_err(|_| {
                    warn!(path = %original.path(), "Thumbnail request timed out");
                    ThumbnailError::Timeout {
                        after_ms: limit.as_millis() as u64,
                    }
                })?,
            None => self.serve(original, request).await,
        }
    }

    async fn serve(
        &self,
        original: &OriginalImage,
        request: ThumbnailRequest,
    ) -> Result<ThumbnailResponse, ThumbnailError> {
        let dimensions = resolve_dimensions(&request, original.width(), original.height());
        let key = self.layout.artifact_key(original.path(), dimensions);

        if let Some(data) = self.read_cached(&key).await? {
            // Originals removed behind the provider's back stop being served
            if !self.store.exists(original.path()).await? {
                debug!(key = %key, path = %original.path(), "Cached thumbnail without original");
                return Err(ThumbnailError::NotFound {
                    path: original.path().to_string(),
                });
            }

            debug!(key = %key, "Thumbnail cache hit");
            return Ok(ThumbnailResponse {
                content_type: content_type_for(&data, key.as_str()),
                data,
                key,
                dimensions,
                cache_hit: true,
            });
        }

        let work = generate_artifact(
            Arc::clone(&self.store),
            self.generator,
            original.path().to_string(),
            key.clone(),
            dimensions,
            dimensions.matches(original.width(), original.height()),
        );
        let data = self.flights.run(key.as_str(), work).await?;

        Ok(ThumbnailResponse {
            content_type: content_type_for(&data, key.as_str()),
            data,
            key,
            dimensions,
            cache_hit: false,
        })
    }

    /// Read a published artifact, or `None` on a miss.
    async fn read_cached(&self, key: &ArtifactKey) -> Result<Option<Bytes>, ThumbnailError> {
        if !self.store.exists(key.as_str()).await? {
            return Ok(None);
        }

        match self.store.open(key.as_str()).await {
            Ok(data) => Ok(Some(data)),
            // Removed between the check and the read
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Generate, publish and read back one artifact.
///
/// Runs detached from the requesting caller, so it owns everything it uses.
async fn generate_artifact<S: CacheStore + 'static>(
    store: Arc<S>,
    generator: ThumbnailGenerator,
    original_path: String,
    key: ArtifactKey,
    dimensions: ResolvedDimensions,
    pass_through: bool,
) -> Result<Bytes, ThumbnailError> {
    // A flight that finished just before this one started already published it
    if store.exists(key.as_str()).await? {
        return Ok(store.open(key.as_str()).await?);
    }

    store.ensure_directory(key.directory()).await?;

    let source = store
        .open(&original_path)
        .await
        .map_err(|e| ThumbnailError::from_original_read(&original_path, e))?;

    let data = if pass_through {
        debug!(path = %original_path, "Requested size matches original, storing verbatim");
        source
    } else {
        let format = output_format(&original_path, &source).ok_or_else(|| {
            GenerateError::Decode("unrecognized image format".to_string())
                .with_path(&original_path)
        })?;

        tokio::task::spawn_blocking(move || generator.generate(&source, format, dimensions))
            .await
            .map_err(|e| ThumbnailError::Internal {
                message: e.to_string(),
            })?
            .map_err(|e| {
                warn!(path = %original_path, error = %e, "Thumbnail generation failed");
                e.with_path(&original_path)
            })?
    };

    store.write_atomic(key.as_str(), data).await?;

    // The original may have been removed while this generation was running
    if !store.exists(&original_path).await? {
        match store.delete(key.as_str()).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {
                debug!(key = %key, path = %original_path, "Discarded thumbnail of removed original");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to discard thumbnail of removed original");
            }
        }
        return Err(ThumbnailError::NotFound { path: original_path });
    }

    info!(
        key = %key,
        width = dimensions.width,
        height = dimensions.height,
        "Published thumbnail"
    );

    Ok(store.open(key.as_str()).await?)
}

// =============================================================================
// Tests
// =============================================================================
