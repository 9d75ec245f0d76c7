//! HTTP request handlers for the thumbnail API.
//!
//! # Endpoints
//!
//! - `GET /images/{W}x{H}/{collection}/{filename}` - Serve a thumbnail
//! - `DELETE /gallery/{collection}/{filename}` - Remove an image and its thumbnails
//! - `DELETE /gallery/{collection}` - Remove a collection directory
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::routes::DEFAULT_CACHE_MAX_AGE;
use crate::error::{StorageError, ThumbnailError};
use crate::original::{CollectionRef, OriginalProvider};
use crate::store::CacheStore;
use crate::thumbnail::{ArtifactLifecycleManager, CleanupReport, ThumbnailRequest, ThumbnailService};

/// Header reporting whether the thumbnail was already cached.
pub const CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-thumbnail-cache-hit");

/// Header reporting the actual thumbnail size as `WxH`.
pub const SIZE_HEADER: HeaderName = HeaderName::from_static("x-thumbnail-size");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: CacheStore + 'static> {
    /// Thumbnail lookup and generation
    pub thumbnail_service: Arc<ThumbnailService<S>>,

    /// Source of original image records
    pub originals: Arc<dyn OriginalProvider>,

    /// Cleanup on image and collection removal
    pub lifecycle: Arc<ArtifactLifecycleManager<S>>,

    /// Default cache control max-age in seconds (defaults to 1 hour)
    pub cache_max_age: u32,
}

impl<S: CacheStore + 'static> AppState<S> {
    /// Create a new application state.
    pub fn new(
        thumbnail_service: Arc<ThumbnailService<S>>,
        originals: Arc<dyn OriginalProvider>,
        lifecycle: Arc<ArtifactLifecycleManager<S>>,
    ) -> Self {
        Self {
            thumbnail_service,
            originals,
            lifecycle,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }
}

impl<S: CacheStore + 'static> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            thumbnail_service: Arc::clone(&self.thumbnail_service),
            originals: Arc::clone(&self.originals),
            lifecycle: Arc::clone(&self.lifecycle),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for preview requests.
///
/// Extracted from: `/images/{size}/{collection}/{filename}`
#[derive(Debug, Deserialize)]
pub struct PreviewPathParams {
    /// Requested size as `{W}x{H}`, zero on one axis keeps the aspect ratio
    pub size: String,

    /// Collection name (percent-decoded)
    pub collection: String,

    /// Image file name
    pub filename: String,
}

/// Path parameters for image removal.
#[derive(Debug, Deserialize)]
pub struct ImagePathParams {
    pub collection: String,
    pub filename: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// Response from the image removal endpoint.
#[derive(Debug, Serialize)]
pub struct ImageRemovedResponse {
    /// `<collection>/<filename>`
    pub image: String,

    /// Thumbnails deleted
    pub thumbnails_removed: usize,

    /// Thumbnails that could not be deleted (left for a sweep)
    pub failures: usize,

    /// Whether the original existed and was deleted
    pub original_removed: bool,
}

/// Response from the collection removal endpoint.
#[derive(Debug, Serialize)]
pub struct CollectionRemovedResponse {
    /// Collection name
    pub collection: String,

    /// Objects deleted, `null` if the cleanup failed
    pub removed: Option<usize>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Map an error to its HTTP status and error type identifier.
pub fn error_status(err: &ThumbnailError) -> (StatusCode, &'static str) {
    match err {
        ThumbnailError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
        ThumbnailError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        ThumbnailError::DecodeError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "decode_error"),
        ThumbnailError::EncodeError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
        ThumbnailError::Storage(storage_err) => match storage_err {
            StorageError::Connection(_) => (StatusCode::BAD_GATEWAY, "connection_error"),
            StorageError::InvalidKey(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        },
        ThumbnailError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        ThumbnailError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    }
}

/// Convert ThumbnailError to HTTP response.
///
/// This implementation logs errors appropriately based on their severity:
/// - 5xx errors are logged at ERROR level (server errors)
/// - 404s are logged at DEBUG level
/// - other 4xx errors are logged at WARN level (client errors)
impl IntoResponse for ThumbnailError {
    fn into_response(self) -> Response {
        let (status, error_type) = error_status(&self);
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle thumbnail preview requests.
///
/// # Endpoint
///
/// `GET /images/{W}x{H}/{collection}/{filename}`
///
/// # Path Parameters
///
/// - `W`, `H`: Requested size; one of them may be 0 to keep the aspect ratio
/// - `collection`: Collection name (URL-encoded if it contains special characters)
/// - `filename`: Image file name inside the collection
///
/// # Response
///
/// - `200 OK`: Thumbnail bytes in the original's format
/// - `400 Bad Request`: Malformed size or `0x0`
/// - `404 Not Found`: No such image
/// - `500 Internal Server Error`: Corrupt original or storage failure
/// - `504 Gateway Timeout`: Generation exceeded the configured timeout
///
/// # Headers
///
/// - `Content-Type`: sniffed from the thumbnail bytes, else from its extension
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Thumbnail-Cache-Hit: true|false`
/// - `X-Thumbnail-Size: {W}x{H}` (actual size after resolution)
pub async fn preview_handler<S: CacheStore + 'static>(
    State(state): State<AppState<S>>,
    Path(params): Path<PreviewPathParams>,
) -> Result<Response, ThumbnailError> {
    let request = ThumbnailRequest::parse(&params.size)?;
    let collection = CollectionRef::new(params.collection)?;

    let original = state
        .originals
        .get_original(&collection, &params.filename)
        .await?;

    let response = match state.thumbnail_service.get_thumbnail(&original, request).await {
        Ok(response) => response,
        Err(e @ ThumbnailError::NotFound { .. }) => {
            // The original went away since it was cached
            state.originals.forget(&collection, &params.filename).await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let headers = [
        (header::CONTENT_TYPE, response.content_type.to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
        (CACHE_HIT_HEADER, response.cache_hit.to_string()),
        (SIZE_HEADER, response.dimensions.to_string()),
    ];

    Ok((StatusCode::OK, headers, Body::from(response.data)).into_response())
}

/// Handle image removal.
///
/// # Endpoint
///
/// `DELETE /gallery/{collection}/{filename}`
///
/// Deletes every thumbnail of the image, then the original. Removing an
/// image that no longer exists succeeds with `original_removed: false`.
pub async fn delete_image_handler<S: CacheStore + 'static>(
    State(state): State<AppState<S>>,
    Path(params): Path<ImagePathParams>,
) -> Result<Json<ImageRemovedResponse>, ThumbnailError> {
    let collection = CollectionRef::new(params.collection)?;
    let path = state
        .thumbnail_service
        .layout()
        .original_key(&collection, &params.filename)?;

    let CleanupReport {
        thumbnails_removed,
        failures,
        original_removed,
    } = state.lifecycle.remove_path(&path).await?;
    state.originals.forget(&collection, &params.filename).await;

    Ok(Json(ImageRemovedResponse {
        image: format!("{}/{}", collection.name(), params.filename),
        thumbnails_removed,
        failures,
        original_removed,
    }))
}

/// Handle collection removal.
///
/// # Endpoint
///
/// `DELETE /gallery/{collection}`
///
/// Best effort: a failed cleanup is logged and reported with `removed: null`.
pub async fn delete_collection_handler<S: CacheStore + 'static>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
) -> Result<Json<CollectionRemovedResponse>, ThumbnailError> {
    let collection = CollectionRef::new(collection)?;

    let removed = state.lifecycle.remove_collection(&collection).await;
    state.originals.forget_collection(&collection).await;

    Ok(Json(CollectionRemovedResponse {
        collection: collection.name().to_string(),
        removed,
    }))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
