//! HTTP server layer for the thumbnailer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │         GET /images/{W}x{H}/{collection}/{filename}             │
//! │         DELETE /gallery/{collection}[/{filename}]               │
//! │                                                                 │
//! │  ┌─────────────────────────────┐  ┌───────────────────────────┐ │
//! │  │          handlers           │  │          routes           │ │
//! │  │ (requests, error mapping)   │  │ (router, CORS, tracing)   │ │
//! │  └─────────────────────────────┘  └───────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    delete_collection_handler, delete_image_handler, error_status, health_handler,
    preview_handler, AppState, CollectionRemovedResponse, ErrorResponse, HealthResponse,
    ImagePathParams, ImageRemovedResponse, PreviewPathParams, CACHE_HIT_HEADER, SIZE_HEADER,
};
pub use routes::{create_router, RouterConfig, DEFAULT_CACHE_MAX_AGE};
