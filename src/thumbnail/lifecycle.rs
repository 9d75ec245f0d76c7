//! Artifact cleanup when originals or collections are removed.
//!
//! Cleanup is best effort: failing to delete a thumbnail is logged and
//! counted but never blocks removal of the original. Leftovers are picked up
//! by [`ArtifactLifecycleManager::sweep`].

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{StorageError, ThumbnailError};
use crate::original::{CollectionRef, OriginalImage};
use crate::store::CacheStore;

use super::key::{split_path, ArtifactLayout};

/// Outcome of removing one original.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Thumbnails deleted
    pub thumbnails_removed: usize,

    /// Thumbnails (or listings) that could not be deleted
    pub failures: usize,

    /// Whether the original bytes were deleted by this call
    pub original_removed: bool,
}

/// Outcome of a reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Thumbnail keys examined
    pub scanned: usize,

    /// Thumbnails whose original no longer exists
    pub orphaned: Vec<String>,

    /// Orphans deleted (always 0 on a dry run)
    pub removed: usize,

    /// Orphans that could not be deleted
    pub failures: usize,
}

// =============================================================================
// Lifecycle Manager
// =============================================================================

/// Deletes cached artifacts together with their originals.
pub struct ArtifactLifecycleManager<S: CacheStore + 'static> {
    store: Arc<S>,
    layout: ArtifactLayout,
}

impl<S: CacheStore + 'static> ArtifactLifecycleManager<S> {
    pub fn new(store: Arc<S>, layout: ArtifactLayout) -> Self {
        Self { store, layout }
    }

    /// Get the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Remove every thumbnail of `original`, then the original bytes.
    ///
    /// Only artifacts named exactly `<stem>_<W>x<H><ext>` for this original
    /// are deleted; thumbnails of other images sharing the directory (even
    /// with a stem starting the same way) are left alone.
    ///
    /// An original that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Storage`] only if deleting the original
    /// bytes fails.
    pub async fn remove_image(
        &self,
        original: &OriginalImage,
    ) -> Result<CleanupReport, ThumbnailError> {
        self.remove_path(original.path()).await
    }

    /// Same as [`remove_image`](Self::remove_image), keyed by the original's
    /// storage path. Works even when the original can no longer be decoded.
    ///
    /// Thumbnails are listed again once the original is gone, which catches
    /// artifacts published by generations that were still running. Later
    /// generations see the missing original and discard their own output.
    pub async fn remove_path(&self, original_path: &str) -> Result<CleanupReport, ThumbnailError> {
        let mut report = CleanupReport::default();
        let mut failed = HashSet::new();

        self.delete_thumbnails(original_path, &mut report, &mut failed).await;

        match self.store.delete(original_path).await {
            Ok(()) => report.original_removed = true,
            Err(StorageError::NotFound(_)) => {
                debug!(path = %original_path, "Original already removed");
            }
            Err(e) => return Err(e.into()),
        }

        self.delete_thumbnails(original_path, &mut report, &mut failed).await;

        info!(
            path = %original_path,
            thumbnails = report.thumbnails_removed,
            failures = report.failures,
            "Removed image"
        );
        Ok(report)
    }

    /// One listing pass over the original's thumbnail directory.
    ///
    /// Keys in `failed` were already counted and are not retried.
    async fn delete_thumbnails(
        &self,
        original_path: &str,
        report: &mut CleanupReport,
        failed: &mut HashSet<String>,
    ) {
        let thumb_prefix = format!("{}/", self.layout.thumbnail_dir(original_path));

        let keys = match self.store.list(&thumb_prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(prefix = %thumb_prefix, error = %e, "Failed to list thumbnails");
                report.failures += 1;
                return;
            }
        };

        let targets: Vec<String> = keys
            .into_iter()
            .filter(|key| self.layout.is_artifact_of(original_path, key) && !failed.contains(key))
            .collect();

        for key in targets {
            match self.store.delete(&key).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {
                    debug!(key = %key, "Deleted thumbnail");
                    report.thumbnails_removed += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to delete thumbnail");
                    report.failures += 1;
                    failed.insert(key);
                }
            }
        }
    }

    /// Remove a collection's whole directory tree, originals and thumbnails.
    ///
    /// Best effort: failures are logged and reported as `None`.
    pub async fn remove_collection(&self, collection: &CollectionRef) -> Option<usize> {
        let prefix = self.layout.collection_prefix(collection);
        match self.store.delete_by_prefix(&prefix).await {
            Ok(removed) => {
                info!(collection = %collection.name(), removed, "Removed collection");
                Some(removed)
            }
            Err(e) => {
                warn!(
                    collection = %collection.name(),
                    error = %e,
                    "Failed to remove collection directory"
                );
                None
            }
        }
    }

    /// Find (and unless `dry_run`, delete) thumbnails whose original is gone.
    ///
    /// Only `<galleries>/<collection>/<thumbnails>/<artifact>` keys are
    /// considered.
    pub async fn sweep(&self, dry_run: bool) -> Result<SweepReport, ThumbnailError> {
        let galleries_prefix = self.layout.galleries_prefix();
        let keys = self.store.list(&galleries_prefix).await?;
        let existing: HashSet<&str> = keys.iter().map(String::as_str).collect();

        let mut report = SweepReport::default();
        for key in &keys {
            let Some(original) = self.layout.original_of(key) else {
                continue;
            };
            if !is_collection_member(&galleries_prefix, &original) {
                continue;
            }

            report.scanned += 1;
            if existing.contains(original.as_str()) {
                continue;
            }

            debug!(key = %key, original = %original, "Orphaned thumbnail");
            report.orphaned.push(key.clone());
        }

        if !dry_run {
            for key in &report.orphaned {
                match self.store.delete(key).await {
                    Ok(()) | Err(StorageError::NotFound(_)) => report.removed += 1,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to delete orphaned thumbnail");
                        report.failures += 1;
                    }
                }
            }
        }

        info!(
            scanned = report.scanned,
            orphaned = report.orphaned.len(),
            removed = report.removed,
            dry_run,
            "Sweep complete"
        );
        Ok(report)
    }
}

/// Whether `path` sits directly inside a collection directory.
fn is_collection_member(galleries_prefix: &str, path: &str) -> bool {
    match path.strip_prefix(galleries_prefix) {
        Some(rest) => {
            let (collection_dir, _) = split_path(rest);
            !collection_dir.is_empty() && !collection_dir.contains('/')
        }
        None => false,
    }
}

// =============================================================================
// Tests
// =============================================================================
