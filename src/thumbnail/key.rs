//! Storage layout and artifact key derivation.
//!
//! ```text
//! galleries/                       <- galleries subdirectory
//!   Summer%202024/                 <- collection directory (URI-escaped name)
//!     beach.jpg                    <- original
//!     thumbnails/                  <- thumbnails subdirectory
//!       beach_400x300.jpg          <- artifact: <stem>_<W>x<H><ext>
//! ```
//!
//! Keys are a pure function of the original's path and the resolved
//! dimensions, so identical requests always land on the same artifact.

use std::fmt;

use super::dimensions::ResolvedDimensions;
use crate::error::ThumbnailError;
use crate::original::CollectionRef;

/// Default subdirectory holding all collections.
pub const DEFAULT_GALLERIES_DIR: &str = "galleries";

/// Default subdirectory, next to the originals, holding thumbnails.
pub const DEFAULT_THUMBNAILS_DIR: &str = "thumbnails";

// =============================================================================
// Artifact Key
// =============================================================================

/// Storage key of a cached thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// The key as a store path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The directory holding this artifact.
    pub fn directory(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Components of a thumbnail file name, `<stem>_<W>x<H><ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName<'a> {
    pub stem: &'a str,
    pub width: u32,
    pub height: u32,
    pub extension: &'a str,
}

impl<'a> ArtifactName<'a> {
    /// Parse a thumbnail file name. Returns `None` for anything else.
    pub fn parse(file_name: &'a str) -> Option<Self> {
        let (base, extension) = split_extension(file_name);
        let (stem, size) = base.rsplit_once('_')?;
        let (w, h) = size.split_once('x')?;

        if stem.is_empty() || !is_decimal(w) || !is_decimal(h) {
            return None;
        }

        Some(Self {
            stem,
            width: w.parse().ok()?,
            height: h.parse().ok()?,
            extension,
        })
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Split `name` into `(stem, extension)`, the extension keeping its dot.
///
/// Leading dots belong to the stem, so `.hidden` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && !name[..idx].chars().all(|c| c == '.') => {
            (&name[..idx], &name[idx..])
        }
        _ => (name, ""),
    }
}

/// Split a store path into `(directory, file name)`.
pub fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

// =============================================================================
// Artifact Layout
// =============================================================================

/// Derives every storage key used for originals and their thumbnails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    galleries_dir: String,
    thumbnails_dir: String,
}

impl ArtifactLayout {
    /// Create a layout with custom subdirectory names.
    pub fn new(galleries_dir: impl Into<String>, thumbnails_dir: impl Into<String>) -> Self {
        Self {
            galleries_dir: galleries_dir.into().trim_matches('/').to_string(),
            thumbnails_dir: thumbnails_dir.into().trim_matches('/').to_string(),
        }
    }

    /// Get the galleries subdirectory.
    pub fn galleries_dir(&self) -> &str {
        &self.galleries_dir
    }

    /// Get the thumbnails subdirectory name.
    pub fn thumbnails_dir(&self) -> &str {
        &self.thumbnails_dir
    }

    /// Prefix covering every stored object (`galleries/`).
    pub fn galleries_prefix(&self) -> String {
        format!("{}/", self.galleries_dir)
    }

    /// Prefix covering a collection's directory tree.
    pub fn collection_prefix(&self, collection: &CollectionRef) -> String {
        format!("{}/{}/", self.galleries_dir, collection.directory())
    }

    /// Storage key of an original image.
    ///
    /// File names must be a single non-empty path segment.
    pub fn original_key(
        &self,
        collection: &CollectionRef,
        filename: &str,
    ) -> Result<String, ThumbnailError> {
        if filename.is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains('/')
            || filename.contains('\\')
        {
            return Err(ThumbnailError::invalid(format!(
                "invalid image file name '{}'",
                filename
            )));
        }
        Ok(format!(
            "{}/{}/{}",
            self.galleries_dir,
            collection.directory(),
            filename
        ))
    }

    /// Directory holding the thumbnails of the original stored at `original_path`.
    pub fn thumbnail_dir(&self, original_path: &str) -> String {
        let (dir, _) = split_path(original_path);
        join(dir, &self.thumbnails_dir)
    }

    /// Build the artifact key for `original_path` at `dims`.
    pub fn artifact_key(&self, original_path: &str, dims: ResolvedDimensions) -> ArtifactKey {
        let (_, basename) = split_path(original_path);
        let (stem, extension) = split_extension(basename);
        let name = format!("{}_{}x{}{}", stem, dims.width, dims.height, extension);
        ArtifactKey(join(&self.thumbnail_dir(original_path), &name))
    }

    /// Whether `key` is a thumbnail of the original stored at `original_path`.
    pub fn is_artifact_of(&self, original_path: &str, key: &str) -> bool {
        let (key_dir, file_name) = split_path(key);
        if key_dir != self.thumbnail_dir(original_path) {
            return false;
        }

        let (_, basename) = split_path(original_path);
        let (stem, extension) = split_extension(basename);
        ArtifactName::parse(file_name)
            .map(|name| name.stem == stem && name.extension == extension)
            .unwrap_or(false)
    }

    /// The original a thumbnail key was derived from, if `key` is one.
    pub fn original_of(&self, key: &str) -> Option<String> {
        let (thumb_dir, file_name) = split_path(key);
        let (original_dir, dir_name) = split_path(thumb_dir);
        if dir_name != self.thumbnails_dir {
            return None;
        }

        let name = ArtifactName::parse(file_name)?;
        Some(join(
            original_dir,
            &format!("{}{}", name.stem, name.extension),
        ))
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::new(DEFAULT_GALLERIES_DIR, DEFAULT_THUMBNAILS_DIR)
    }
}

// =============================================================================
// Tests
// =============================================================================
