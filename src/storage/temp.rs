//! Scratch files for in-flight uploads and renders
//!
//! Every path handed out is tracked; [`TempFileManager::cleanup`] removes one,
//! [`TempFileManager::cleanup_all`] removes the rest, and dropping the manager
//! does the same. [`TempPath`] ties one path to a scope.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Directory name under the system temp dir when no base is configured
pub const DEFAULT_DIR_NAME: &str = "pose-est";

#[derive(Debug)]
pub struct TempFileManager {
    base_dir: PathBuf,
    tracked: Mutex<HashSet<PathBuf>>,
}

impl TempFileManager {
    /// Create a manager rooted at `base_dir`, or `<temp>/pose-est`
    pub fn new(base_dir: Option<&Path>) -> Result<Self> {
        let base_dir = base_dir.map_or_else(
            || std::env::temp_dir().join(DEFAULT_DIR_NAME),
            Path::to_path_buf,
        );
        std::fs::create_dir_all(&base_dir)?;
        debug!("TempFileManager initialized: base_dir={}", base_dir.display());

        Ok(Self {
            base_dir,
            tracked: Mutex::new(HashSet::new()),
        })
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Allocate `<base>/<uuid><suffix>`; the file itself is not created
    pub fn create_temp_path(&self, suffix: &str) -> PathBuf {
        let path = self
            .base_dir
            .join(format!("{}{suffix}", uuid::Uuid::new_v4()));
        self.lock().insert(path.clone());
        debug!("Created temp path: {}", path.display());
        path
    }

    /// Allocate a path that is cleaned up when the returned guard drops
    pub fn scoped_temp_path(&self, suffix: &str) -> TempPath<'_> {
        TempPath {
            manager: self,
            path: self.create_temp_path(suffix),
        }
    }

    /// Remove `path` and stop tracking it.
    ///
    /// Returns `true` only if the file existed and was deleted.
    pub fn cleanup(&self, path: &Path) -> bool {
        let deleted = path.exists() && std::fs::remove_file(path).is_ok();

        if deleted {
            debug!("Deleted temp file: {}", path.display());
        } else if path.exists() {
            warn!("Failed to delete temp file: {}", path.display());
        }

        self.lock().remove(path);
        deleted
    }

    /// Remove every tracked file, returning how many were deleted
    pub fn cleanup_all(&self) -> usize {
        let paths: Vec<PathBuf> = self.lock().iter().cloned().collect();
        let count = paths.iter().filter(|p| self.cleanup(p)).count();
        info!("Cleaned up {} temp files", count);
        count
    }

    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A tracked temp path removed on drop, including when the owning future is
/// cancelled mid-await
#[derive(Debug)]
pub struct TempPath<'a> {
    manager: &'a TempFileManager,
    path: PathBuf,
}

impl TempPath<'_> {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for TempPath<'_> {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempPath<'_> {
    fn drop(&mut self) {
        self.manager.cleanup(&self.path);
    }
}

impl Drop for TempFileManager {
    fn drop(&mut self) {
        if self.tracked_count() > 0 {
            self.cleanup_all();
        }
    }
}
