//! Thumbnail request validation and target dimension resolution.
//!
//! Resolution rules, applied in order:
//!
//! 1. A non-zero requested axis larger than the original means no resize:
//!    the original dimensions are returned unchanged. Upscaling never happens.
//! 2. Both axes requested: taken literally, aspect ratio is not preserved.
//! 3. One axis zero: it is derived from the other using the original's
//!    aspect ratio, rounded half-up, and never below 1.

use crate::error::ThumbnailError;

// =============================================================================
// Thumbnail Request
// =============================================================================

/// Requested thumbnail size. Zero on one axis means "preserve aspect ratio".
///
/// Construction rejects `0x0`, so a value of this type is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThumbnailRequest {
    width: u32,
    height: u32,
}

impl ThumbnailRequest {
    /// Create a request, rejecting `0x0`.
    pub fn new(width: u32, height: u32) -> Result<Self, ThumbnailError> {
        if width == 0 && height == 0 {
            return Err(ThumbnailError::invalid(
                "width and height cannot both be zero",
            ));
        }
        Ok(Self { width, height })
    }

    /// Parse a `{W}x{H}` size segment such as `400x0`.
    ///
    /// Negative, missing or non-numeric values are rejected.
    pub fn parse(segment: &str) -> Result<Self, ThumbnailError> {
        let (w, h) = segment
            .split_once('x')
            .ok_or_else(|| ThumbnailError::invalid(format!("malformed size '{}'", segment)))?;

        let parse_axis = |value: &str, axis: &str| {
            value.parse::<u32>().map_err(|_| {
                ThumbnailError::invalid(format!(
                    "{} must be a non-negative integer, got '{}'",
                    axis, value
                ))
            })
        };

        Self::new(parse_axis(w, "width")?, parse_axis(h, "height")?)
    }

    /// Requested width (0 = derive from height).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Requested height (0 = derive from width).
    pub fn height(&self) -> u32 {
        self.height
    }
}

// =============================================================================
// Resolved Dimensions
// =============================================================================

/// Concrete target size, at least 1x1 and never larger than the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedDimensions {
    pub width: u32,
    pub height: u32,
}

impl ResolvedDimensions {
    /// Whether these dimensions equal `(width, height)`.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

impl std::fmt::Display for ResolvedDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Resolve the target size of a thumbnail.
///
/// `original_width` and `original_height` must be non-zero.
pub fn resolve_dimensions(
    request: &ThumbnailRequest,
    original_width: u32,
    original_height: u32,
) -> ResolvedDimensions {
    let (req_w, req_h) = (request.width(), request.height());
    let original = ResolvedDimensions {
        width: original_width.max(1),
        height: original_height.max(1),
    };

    if req_w > original.width || req_h > original.height {
        return original;
    }

    if req_w > 0 && req_h > 0 {
        return ResolvedDimensions {
            width: req_w,
            height: req_h,
        };
    }

    if req_w == 0 {
        ResolvedDimensions {
            width: scale_round(original.width, req_h, original.height),
            height: req_h,
        }
    } else {
        ResolvedDimensions {
            width: req_w,
            height: scale_round(original.height, req_w, original.width),
        }
    }
}

/// Compute `round(value * num / den)` with halves rounded up, minimum 1.
///
/// Exact integer arithmetic keeps results reproducible across platforms.
fn scale_round(value: u32, num: u32, den: u32) -> u32 {
    let (value, num, den) = (value as u64, num as u64, den as u64);
    let scaled = (2 * value * num + den) / (2 * den);
    scaled.clamp(1, u32::MAX as u64) as u32
}

// =============================================================================
// Tests
// =============================================================================
