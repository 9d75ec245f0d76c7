//! Configuration management for the gallery thumbnailer.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `THUMB_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use gallery_thumbnailer::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Check(_) | Command::Sweep(_) => {}
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `THUMB_HOST` - Server bind address (default: 0.0.0.0)
//! - `THUMB_PORT` - Server port (default: 3000)
//! - `THUMB_STORAGE` - Storage backend, `local` or `s3` (default: local)
//! - `THUMB_MEDIA_ROOT` - Media root directory (required for local storage)
//! - `THUMB_S3_BUCKET` - S3 bucket name (required for s3 storage)
//! - `THUMB_S3_PREFIX` - Key prefix inside the bucket
//! - `THUMB_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `THUMB_S3_REGION` - AWS region (default: us-east-1)
//! - `THUMB_GALLERIES_DIR` - Subdirectory holding collections (default: galleries)
//! - `THUMB_THUMBNAILS_DIR` - Thumbnail subdirectory name (default: thumbnails)
//! - `THUMB_JPEG_QUALITY` - JPEG quality for thumbnails (default: 80)
//! - `THUMB_GENERATION_TIMEOUT` - Per-request timeout in seconds, 0 = none (default: 30)
//! - `THUMB_CACHE_ORIGINALS` - Original records kept in memory (default: 1000)
//! - `THUMB_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `THUMB_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::original::DEFAULT_ORIGINAL_CACHE_CAPACITY;
use crate::server::DEFAULT_CACHE_MAX_AGE;
use crate::thumbnail::{
    is_valid_quality, ArtifactLayout, DEFAULT_GALLERIES_DIR, DEFAULT_JPEG_QUALITY,
    DEFAULT_THUMBNAILS_DIR,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default generation timeout in seconds.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Gallery Thumbnailer - on-demand image thumbnails with a durable cache.
///
/// Serves resized previews of gallery images, generating each size once and
/// storing it next to the original on local disk or in S3.
#[derive(Parser, Debug, Clone)]
#[command(name = "gallery-thumbnailer")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments for the default `serve` command.
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// The command to run; `serve` when none is given.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve(ServeConfig),

    /// Check the storage configuration and connectivity.
    Check(CheckConfig),

    /// Remove thumbnails whose original no longer exists.
    Sweep(SweepConfig),
}

/// Storage backend selection.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local filesystem below `--media-root`
    Local,
    /// S3 or an S3-compatible service
    S3,
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Where originals and thumbnails are stored.
#[derive(Args, Debug, Clone)]
pub struct StorageConfig {
    /// Storage backend.
    #[arg(long, value_enum, default_value = "local", env = "THUMB_STORAGE")]
    pub storage: StorageBackend,

    /// Media root directory (local storage).
    #[arg(long, env = "THUMB_MEDIA_ROOT")]
    pub media_root: Option<PathBuf>,

    /// S3 bucket name (s3 storage).
    #[arg(long, env = "THUMB_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix all objects live under inside the bucket.
    #[arg(long, env = "THUMB_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    ///
    /// If not specified, uses the default AWS S3 endpoint.
    #[arg(long, env = "THUMB_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "THUMB_S3_REGION")]
    pub s3_region: String,

    /// Subdirectory holding the collections.
    #[arg(long, default_value = DEFAULT_GALLERIES_DIR, env = "THUMB_GALLERIES_DIR")]
    pub galleries_dir: String,

    /// Subdirectory, next to each original, holding its thumbnails.
    #[arg(long, default_value = DEFAULT_THUMBNAILS_DIR, env = "THUMB_THUMBNAILS_DIR")]
    pub thumbnails_dir: String,
}

impl StorageConfig {
    /// Validate the storage settings and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self.storage {
            StorageBackend::Local => {
                if self.media_root.is_none() {
                    return Err(
                        "Media root is required for local storage. \
                         Set --media-root or THUMB_MEDIA_ROOT"
                            .to_string(),
                    );
                }
            }
            StorageBackend::S3 => {
                if self.s3_bucket.as_deref().map_or(true, str::is_empty) {
                    return Err(
                        "S3 bucket name is required for s3 storage. \
                         Set --s3-bucket or THUMB_S3_BUCKET"
                            .to_string(),
                    );
                }
            }
        }

        for (name, value) in [
            ("galleries_dir", &self.galleries_dir),
            ("thumbnails_dir", &self.thumbnails_dir),
        ] {
            let trimmed = value.trim_matches('/');
            if trimmed.is_empty() || trimmed.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
                return Err(format!("{} must be a relative directory, got '{}'", name, value));
            }
        }
        if self.thumbnails_dir.trim_matches('/').contains('/') {
            return Err("thumbnails_dir must be a single directory name".to_string());
        }

        Ok(())
    }

    /// Key layout for these settings.
    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.galleries_dir, &self.thumbnails_dir)
    }
}

// =============================================================================
// Serve Configuration
// =============================================================================

/// Settings for the HTTP server.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "THUMB_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "THUMB_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    #[command(flatten)]
    pub storage: StorageConfig,

    // =========================================================================
    // Thumbnail Configuration
    // =========================================================================
    /// JPEG quality for JPEG thumbnails (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "THUMB_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Maximum seconds a request waits for generation (0 = no limit).
    ///
    /// Generation continues in the background after a timeout.
    #[arg(long, default_value_t = DEFAULT_GENERATION_TIMEOUT_SECS, env = "THUMB_GENERATION_TIMEOUT")]
    pub generation_timeout: u64,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of original image records to keep in memory.
    #[arg(long, default_value_t = DEFAULT_ORIGINAL_CACHE_CAPACITY, env = "THUMB_CACHE_ORIGINALS")]
    pub cache_originals: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "THUMB_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "THUMB_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;

        if self.cache_originals == 0 {
            return Err("cache_originals must be greater than 0".to_string());
        }

        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Generation timeout, `None` when disabled.
    pub fn generation_timeout(&self) -> Option<Duration> {
        (self.generation_timeout > 0).then(|| Duration::from_secs(self.generation_timeout))
    }
}

// =============================================================================
// Check Configuration
// =============================================================================

/// Settings for the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub storage: StorageConfig,

    /// Inspect one image, given as `<collection>/<filename>`.
    #[arg(long)]
    pub test_image: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    /// Split `--test-image` into collection and file name.
    pub fn test_image_parts(&self) -> Option<Result<(&str, &str), String>> {
        self.test_image.as_deref().map(|image| {
            image
                .split_once('/')
                .filter(|(collection, filename)| !collection.is_empty() && !filename.is_empty())
                .ok_or_else(|| {
                    format!("--test-image must be <collection>/<filename>, got '{}'", image)
                })
        })
    }
}

// =============================================================================
// Sweep Configuration
// =============================================================================

/// Settings for the `sweep` command.
#[derive(Args, Debug, Clone)]
pub struct SweepConfig {
    #[command(flatten)]
    pub storage: StorageConfig,

    /// Only report orphaned thumbnails, delete nothing.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
