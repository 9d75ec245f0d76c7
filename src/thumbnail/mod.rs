//! Thumbnail generation and cache layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            ThumbnailService             │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ resolve dims │  │   Generator     │  │
//! │  │ + build key  │  │ (decode →       │  │
//! │  │              │  │  resize→encode) │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               CacheStore                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ThumbnailRequest`] and [`resolve_dimensions`]: requested size to actual size
//! - [`ArtifactLayout`] and [`ArtifactKey`]: where originals and thumbnails live
//! - [`ThumbnailGenerator`]: pure decode/resize/encode transform
//! - [`ThumbnailService`]: cache lookup, single-flight generation, atomic publish
//! - [`ArtifactLifecycleManager`]: cleanup when images or collections go away
//!
//! # Example
//!
//! ```
//! use gallery_thumbnailer::thumbnail::{resolve_dimensions, ArtifactLayout, ThumbnailRequest};
//!
//! let request = ThumbnailRequest::new(400, 0).unwrap();
//! let dims = resolve_dimensions(&request, 800, 600);
//! assert_eq!((dims.width, dims.height), (400, 300));
//!
//! let key = ArtifactLayout::default().artifact_key("galleries/summer/photo.jpg", dims);
//! assert_eq!(key.as_str(), "galleries/summer/thumbnails/photo_400x300.jpg");
//! ```

mod dimensions;
mod generator;
mod key;
mod lifecycle;
mod service;

pub use dimensions::{resolve_dimensions, ResolvedDimensions, ThumbnailRequest};
pub use generator::{
    clamp_quality, is_valid_quality, output_format, ThumbnailGenerator, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY, RESIZE_FILTER,
};
pub use key::{
    split_extension, split_path, ArtifactKey, ArtifactLayout, ArtifactName,
    DEFAULT_GALLERIES_DIR, DEFAULT_THUMBNAILS_DIR,
};
pub use lifecycle::{ArtifactLifecycleManager, CleanupReport, SweepReport};
pub use service::{ThumbnailResponse, ThumbnailService};
