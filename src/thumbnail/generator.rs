//! Thumbnail generator.
//!
//! Decodes original bytes, resizes to the resolved dimensions and encodes
//! back to the original's format. A pure transform: no storage access.
//!
//! # Design Decisions
//!
//! - **Fixed filter**: bilinear (`FilterType::Triangle`) for every request, so
//!   identical inputs always produce identical artifacts.
//!
//! - **Same format out**: the output format is the source format; JPEG output
//!   uses a configurable quality.
//!
//! - **Exact size**: [`ResolvedDimensions`] already encodes the aspect policy,
//!   so the resize never adjusts it.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use super::dimensions::ResolvedDimensions;
use crate::error::GenerateError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Resampling filter used for every thumbnail.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

// =============================================================================
// Thumbnail Generator
// =============================================================================

/// Decode, resize and re-encode image bytes.
///
/// # Example
///
/// ```ignore
/// use gallery_thumbnailer::thumbnail::{ThumbnailGenerator, ResolvedDimensions};
///
/// let generator = ThumbnailGenerator::new();
/// let format = output_format("galleries/c/photo.jpg", &source).unwrap();
/// let thumb = generator.generate(&source, format, ResolvedDimensions { width: 400, height: 300 })?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailGenerator {
    jpeg_quality: u8,
}

impl ThumbnailGenerator {
    /// Create a generator using the default JPEG quality.
    pub fn new() -> Self {
        Self::with_quality(DEFAULT_JPEG_QUALITY)
    }

    /// Create a generator with a JPEG quality, clamped to 1-100.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            jpeg_quality: clamp_quality(quality),
        }
    }

    /// JPEG quality used for JPEG output.
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Produce a thumbnail of `source` at exactly `dims`.
    ///
    /// # Arguments
    ///
    /// * `source` - Original image bytes
    /// * `format` - Format of the original, also used for the output
    /// * `dims` - Target size
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Decode`] if the bytes are not a valid image
    /// of `format`, and [`GenerateError::Encode`] if the output cannot be
    /// written in that format.
    pub fn generate(
        &self,
        source: &[u8],
        format: ImageFormat,
        dims: ResolvedDimensions,
    ) -> Result<Bytes, GenerateError> {
        let img = ImageReader::with_format(Cursor::new(source), format)
            .decode()
            .map_err(|e| GenerateError::Decode(e.to_string()))?;

        let resized = if img.width() == dims.width && img.height() == dims.height {
            img
        } else {
            img.resize_exact(dims.width, dims.height, RESIZE_FILTER)
        };

        self.encode(resized, format)
    }

    fn encode(&self, img: DynamicImage, format: ImageFormat) -> Result<Bytes, GenerateError> {
        let mut output = Vec::new();

        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let img = match img {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
                    other => DynamicImage::ImageRgb8(other.to_rgb8()),
                };
                let mut encoder = JpegEncoder::new_with_quality(&mut output, self.jpeg_quality);
                encoder
                    .encode_image(&img)
                    .map_err(|e| GenerateError::Encode(e.to_string()))?;
            }
            ImageFormat::WebP => {
                let img = match img {
                    DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
                    other => DynamicImage::ImageRgba8(other.to_rgba8()),
                };
                img.write_to(&mut Cursor::new(&mut output), format)
                    .map_err(|e| GenerateError::Encode(e.to_string()))?;
            }
            _ => {
                img.write_to(&mut Cursor::new(&mut output), format)
                    .map_err(|e| GenerateError::Encode(e.to_string()))?;
            }
        }

        Ok(Bytes::from(output))
    }
}

impl Default for ThumbnailGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Format of the original stored at `path`.
///
/// Sniffed from the bytes, falling back to the path's extension. Returns
/// `None` when neither identifies a known format.
pub fn output_format(path: &str, source: &[u8]) -> Option<ImageFormat> {
    image::guess_format(source)
        .ok()
        .or_else(|| ImageFormat::from_path(path).ok())
}

/// Validate JPEG quality parameter.
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
///
/// Values below 1 become 1, values above 100 become 100.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
