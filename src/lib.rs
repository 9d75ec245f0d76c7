//! # Gallery Thumbnailer
//!
//! On-demand thumbnail generation with a durable cache for image galleries.
//!
//! Given a stored original and a requested width/height, the library
//! computes the target size, derives a deterministic storage key, and either
//! serves the cached artifact or generates, publishes and serves it.
//!
//! ## Features
//!
//! - **Aspect-aware sizing**: a zero axis is derived from the original's aspect ratio
//! - **No upscaling**: oversize requests fall back to the original dimensions
//! - **Durable cache**: thumbnails live next to their originals, published atomically
//! - **Single-flight**: concurrent misses for the same thumbnail generate it once
//! - **Pluggable storage**: local filesystem or S3-compatible object storage
//!
//! ## Architecture
//!
//! - [`store`] - Cache store trait with local and S3 backends
//! - [`original`] - Original image records and the provider seam
//! - [`thumbnail`] - Dimension resolution, keys, generation, service and cleanup
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gallery_thumbnailer::{
//!     CollectionRef, LocalFsStore, OriginalProvider, StoreCatalog, ThumbnailRequest,
//!     ThumbnailService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(LocalFsStore::new("/srv/media"));
//!     let catalog = StoreCatalog::new(Arc::clone(&store), Default::default());
//!     let service = ThumbnailService::with_shared_store(store);
//!
//!     let collection = CollectionRef::new("Summer 2024")?;
//!     let original = catalog.get_original(&collection, "beach.jpg").await?;
//!     let thumb = service
//!         .get_thumbnail(&original, ThumbnailRequest::new(400, 0)?)
//!         .await?;
//!
//!     println!("{} ({} bytes)", thumb.key, thumb.data.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod flight;
pub mod original;
pub mod server;
pub mod store;
pub mod thumbnail;

// Re-export commonly used types
pub use config::{
    CheckConfig, Cli, Command, ServeConfig, StorageBackend, StorageConfig, SweepConfig,
};
pub use error::{GenerateError, StorageError, ThumbnailError};
pub use flight::SingleFlight;
pub use original::{
    read_dimensions, CollectionRef, OriginalImage, OriginalProvider, StoreCatalog,
    DEFAULT_ORIGINAL_CACHE_CAPACITY,
};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use store::{create_s3_client, CacheStore, LocalFsStore, S3Store};
pub use thumbnail::{
    resolve_dimensions, ArtifactKey, ArtifactLayout, ArtifactLifecycleManager, CleanupReport,
    ResolvedDimensions, SweepReport, ThumbnailGenerator, ThumbnailRequest, ThumbnailResponse,
    ThumbnailService,
};
