use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{validate_key, validate_prefix, CacheStore};
use crate::error::StorageError;

/// Suffix of in-progress writes. Objects carrying it are never listed.
const TEMP_SUFFIX: &str = ".tmp";

/// Distinguishes concurrent temp files written by this process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local filesystem implementation of [`CacheStore`].
///
/// Keys map to files below `root`. Writes go to a hidden temp file in the
/// destination directory, are flushed to disk, then renamed over the final
/// path. Rename within a directory is atomic on POSIX filesystems.
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    root: PathBuf,
    identifier: String,
}

impl LocalFsStore {
    /// Create a store rooted at `root` (the media root).
    ///
    /// The directory is not created until something is written.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identifier = format!("file://{}", root.display());
        Self { root, identifier }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("object");
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.with_file_name(format!(
            ".{}.{}.{}{}",
            name,
            std::process::id(),
            seq,
            TEMP_SUFFIX
        ))
    }

    /// Recursively collect file keys below `dir`.
    async fn walk(&self, dir: PathBuf) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut pending = vec![dir];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(format!("{}: {}", dir.display(), e))),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::Io(format!("{}: {}", dir.display(), e)))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::Io(e.to_string()))?;
                let path = entry.path();

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if is_temp_file(&path) {
                        continue;
                    }
                    if let Some(key) = self.key_for(&path) {
                        keys.push(key);
                    }
                }
            }
        }

        Ok(keys)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative.iter().map(|p| p.to_str()).collect();
        Some(parts?.join("/"))
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.') && name.ends_with(TEMP_SUFFIX))
        .unwrap_or(false)
}

#[async_trait]
impl CacheStore for LocalFsStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io(key, e)),
        }
    }

    async fn open(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.path_for(key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        Ok(Bytes::from(data))
    }

    async fn ensure_directory(&self, prefix: &str) -> Result<(), StorageError> {
        let path = self.path_for(prefix.trim_end_matches('/'))?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| StorageError::from_io(prefix, e))
    }

    async fn write_atomic(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io(key, e))?;
        }

        let tmp = Self::temp_path_for(&path);
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(tmp = %tmp.display(), "Failed to remove temp file: {}", cleanup);
                }
            }
            return Err(StorageError::Io(format!("{}: {}", key, e)));
        }

        debug!(key, bytes = data.len(), "Published object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| StorageError::from_io(key, e))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        validate_prefix(prefix)?;
        if prefix.is_empty() {
            return Err(StorageError::InvalidKey(
                "refusing to delete the whole store".to_string(),
            ));
        }

        let keys = self.list(prefix).await?;

        // A directory prefix removes the whole tree, temp files included.
        if let Some(dir) = prefix.strip_suffix('/') {
            let path = self.path_for(dir)?;
            return match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => Ok(keys.len()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
                Err(e) => Err(StorageError::from_io(prefix, e)),
            };
        }

        let mut removed = 0;
        for key in &keys {
            match self.delete(key).await {
                Ok(()) => removed += 1,
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        validate_prefix(prefix)?;

        // Walk from the deepest directory fully named by the prefix.
        let dir = match prefix.rfind('/') {
            Some(idx) => self.root.join(&prefix[..idx]),
            None => self.root.clone(),
        };

        let mut keys: Vec<String> = self
            .walk(dir)
            .await?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn check_access(&self) -> Result<(), StorageError> {
        let meta = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {}", self.root.display(), e)))?;
        if !meta.is_dir() {
            return Err(StorageError::Io(format!(
                "{}: not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
