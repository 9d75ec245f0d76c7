//! Cache store layer.
//!
//! A [`CacheStore`] is a byte-addressable hierarchical store holding both the
//! original images and their derived thumbnails. Keys are relative,
//! `/`-separated paths such as `galleries/summer/thumbnails/beach_400x300.jpg`;
//! each backend maps them onto its own namespace.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       ThumbnailService / Lifecycle      │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            CacheStore Trait             │
//! └────────────────────┬────────────────────┘
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │  LocalFsStore   │    │      S3Store        │
//! │ (tmp + rename)  │    │ (single PutObject)  │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod local;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

pub use local::LocalFsStore;
pub use s3::{create_s3_client, S3Store};

/// Capability set over a durable key/value store with hierarchical keys.
///
/// All mutation goes through [`write_atomic`](CacheStore::write_atomic),
/// [`ensure_directory`](CacheStore::ensure_directory),
/// [`delete`](CacheStore::delete) and
/// [`delete_by_prefix`](CacheStore::delete_by_prefix). Readers never observe a
/// partially written object.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check whether an object is stored under `key`.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Read the full object stored under `key`.
    ///
    /// Fails with [`StorageError::NotFound`] if absent.
    async fn open(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Make sure the directory `prefix` exists, creating parents as needed.
    ///
    /// Idempotent. Backends without real directories treat this as a no-op.
    async fn ensure_directory(&self, prefix: &str) -> Result<(), StorageError>;

    /// Publish `data` under `key` in a single indivisible step.
    ///
    /// On failure nothing is visible under `key`.
    async fn write_atomic(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Remove the object stored under `key`.
    ///
    /// Fails with [`StorageError::NotFound`] if absent.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every object whose key starts with `prefix`.
    ///
    /// Returns the number of objects removed. Partial deletions are not
    /// rolled back.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, StorageError>;

    /// List the keys of all objects starting with `prefix`, sorted.
    ///
    /// An empty prefix lists the whole store.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Cheap reachability check, used at startup.
    ///
    /// Backends that cannot become unreachable keep the default.
    async fn check_access(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Human readable location of this store, for logging.
    fn identifier(&self) -> &str;
}

// =============================================================================
// Key Validation
// =============================================================================

/// Validate an object key.
///
/// Keys must be non-empty, relative and made of non-empty segments that are
/// neither `.` nor `..`.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Validate a key prefix.
///
/// Same rules as [`validate_key`], except that a trailing `/` and the empty
/// prefix are allowed.
pub fn validate_prefix(prefix: &str) -> Result<(), StorageError> {
    let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    if trimmed.is_empty() {
        if prefix.is_empty() {
            return Ok(());
        }
        return Err(StorageError::InvalidKey(prefix.to_string()));
    }
    validate_key(trimmed)
}

/// Guess a MIME type from a key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    image::ImageFormat::from_path(key)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// MIME type of stored bytes: sniffed from the data, else from the key.
pub fn content_type_for(data: &[u8], key: &str) -> &'static str {
    match image::guess_format(data) {
        Ok(format) => format.to_mime_type(),
        Err(_) => content_type_for_key(key),
    }
}
