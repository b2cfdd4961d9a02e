//! Scoped scratch directory used to stage the base snapshot's bbolt file and
//! each fetched delta blob before it is applied.

use crate::error::RestoreResult;
use std::path::{Path, PathBuf};

/// Owns a directory on disk and removes it (and everything under it) on
/// drop, regardless of which exit path the restore took. Grounded on the
/// same "delete on any exit" guarantee this codebase's snapshot engine and
/// fractal task manager both give their own scratch/cleanup directories.
pub struct TempDirectory {
    path: PathBuf,
}

impl TempDirectory {
    /// Create a fresh temp dir at exactly `path`, clearing any stale
    /// contents left behind by a previous, uncleanly-terminated restore.
    pub fn create_at(path: impl AsRef<Path>) -> RestoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDirectory {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                log::error!("failed to remove temp directory {:?}: {e}", self.path);
            }
        }
    }
}
