use thiserror::Error;

/// Errors raised by a [`CacheStore`](crate::store::CacheStore) backend.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// No object is stored under the key
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Local filesystem failure (permissions, disk full, ...)
    #[error("I/O error: {0}")]
    Io(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Key is not a valid relative `/`-separated path
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Map a `std::io::Error` for `key`, keeping `NotFound` distinguishable.
    pub fn from_io(key: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(format!("{}: {}", key, err))
        }
    }
}

/// Errors that can occur while serving a thumbnail.
#[derive(Debug, Clone, Error)]
pub enum ThumbnailError {
    /// Request rejected before any I/O (both dimensions zero, bad path segment)
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The referenced original image does not exist
    #[error("Original image not found: {path}")]
    NotFound { path: String },

    /// The original bytes could not be decoded as an image
    #[error("Failed to decode {path}: {message}")]
    DecodeError { path: String, message: String },

    /// The resized image could not be encoded
    #[error("Failed to encode thumbnail: {message}")]
    EncodeError { message: String },

    /// Cache backend failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The caller's deadline elapsed; generation keeps running in the background
    #[error("Thumbnail generation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// A background task failed unexpectedly (panic or cancellation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ThumbnailError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ThumbnailError::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Map a storage error hit while reading the original at `path`.
    pub(crate) fn from_original_read(path: &str, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ThumbnailError::NotFound {
                path: path.to_string(),
            },
            other => ThumbnailError::Storage(other),
        }
    }
}

/// Failures of the pure decode/resize/encode transform.
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    /// Unrecognized format or corrupt data
    #[error("decode failed: {0}")]
    Decode(String),

    /// The output format could not encode the image
    #[error("encode failed: {0}")]
    Encode(String),
}

impl GenerateError {
    /// Attach the original's path for diagnostics.
    pub fn with_path(self, path: &str) -> ThumbnailError {
        match self {
            GenerateError::Decode(message) => ThumbnailError::DecodeError {
                path: path.to_string(),
                message,
            },
            GenerateError::Encode(message) => ThumbnailError::EncodeError { message },
        }
    }
}
