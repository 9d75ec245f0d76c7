//! Original image records and the provider seam.
//!
//! The thumbnail core never writes original records; it only reads the
//! storage path and pixel dimensions. Records are supplied by an
//! [`OriginalProvider`]. [`StoreCatalog`] is the provider shipped with the
//! crate: it resolves originals straight from the [`CacheStore`](crate::store::CacheStore).
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            HTTP Handlers                │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │       OriginalProvider (StoreCatalog)   │
//! │  (LRU of immutable records, reads       │
//! │   width/height once per original)       │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              CacheStore                 │
//! └─────────────────────────────────────────┘
//! ```

mod catalog;

use std::borrow::Cow;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::ThumbnailError;

pub use catalog::{read_dimensions, OriginalProvider, StoreCatalog, DEFAULT_ORIGINAL_CACHE_CAPACITY};

// =============================================================================
// Collection Reference
// =============================================================================

/// Bytes escaped in collection directory names.
///
/// Everything except alphanumerics and the URI path characters
/// `-._~!$&'()*+,:@`. `/` stays escaped since a name is a single segment.
const DIRECTORY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b':')
    .remove(b'@');

/// Reference to the collection (gallery) owning an original.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    name: String,
}

impl CollectionRef {
    /// Create a collection reference, rejecting names that cannot map to a
    /// single directory.
    pub fn new(name: impl Into<String>) -> Result<Self, ThumbnailError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ThumbnailError::invalid("collection name cannot be empty"));
        }
        if name.contains('/') {
            return Err(ThumbnailError::invalid(
                "collection name cannot contain '/'",
            ));
        }
        if name == "." || name == ".." {
            return Err(ThumbnailError::invalid(format!(
                "invalid collection name '{}'",
                name
            )));
        }
        Ok(Self { name })
    }

    /// The collection's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory name of the collection (the name escaped for URI paths).
    pub fn directory(&self) -> Cow<'_, str> {
        utf8_percent_encode(&self.name, DIRECTORY_ESCAPE).into()
    }
}

// =============================================================================
// Original Image
// =============================================================================

/// An ingested, immutable original image.
///
/// Width and height are fixed at construction; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalImage {
    id: String,
    path: String,
    width: u32,
    height: u32,
    collection: CollectionRef,
}

impl OriginalImage {
    /// Create an original record.
    ///
    /// # Arguments
    ///
    /// * `id` - Opaque identity (the catalog uses `<collection>/<filename>`)
    /// * `path` - Storage key of the original bytes
    /// * `width`, `height` - Pixel dimensions, both non-zero
    /// * `collection` - Owning collection
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        width: u32,
        height: u32,
        collection: CollectionRef,
    ) -> Result<Self, ThumbnailError> {
        let path = path.into();
        if width == 0 || height == 0 {
            return Err(ThumbnailError::DecodeError {
                path,
                message: format!("image has empty dimensions {}x{}", width, height),
            });
        }
        Ok(Self {
            id: id.into(),
            path,
            width,
            height,
            collection,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Storage key of the original bytes.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }
}
