// rootstrap-common/src/cache.rs
// Download cache for package archives, scoped to one bootstrap run unless the
// user asked to keep it.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::error::{Result, RootstrapError};
use crate::Config;

enum CacheDir {
    /// Removed when the `Cache` is dropped.
    Temporary(TempDir),
    /// Chosen by the user; left in place.
    Preserved(PathBuf),
}

/// Cache struct to manage the package archive directory
pub struct Cache {
    dir: CacheDir,
}

impl Cache {
    /// Opens the configured cache directory, or a fresh temporary one when the
    /// configuration names none.
    pub fn new(config: &Config) -> Result<Self> {
        let dir = match &config.cache_dir {
            Some(path) => {
                fs::create_dir_all(path)
                    .map_err(|e| RootstrapError::io_at("create cache directory", path, e))?;
                tracing::debug!("Using preserved cache directory: {}", path.display());
                CacheDir::Preserved(path.clone())
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("rootstrap-")
                    .tempdir()
                    .map_err(|e| {
                        RootstrapError::IoError(format!(
                            "Failed to create temporary cache directory: {e}"
                        ))
                    })?;
                tracing::debug!("Using temporary cache directory: {}", temp.path().display());
                CacheDir::Temporary(temp)
            }
        };
        Ok(Self { dir })
    }

    /// Gets the cache directory path
    pub fn get_dir(&self) -> &Path {
        match &self.dir {
            CacheDir::Temporary(temp) => temp.path(),
            CacheDir::Preserved(path) => path,
        }
    }

    /// Path a cached artifact with this file name lives at.
    pub fn entry_path(&self, file_name: &str) -> PathBuf {
        self.get_dir().join(file_name)
    }

    pub fn is_preserved(&self) -> bool {
        matches!(self.dir, CacheDir::Preserved(_))
    }

    /// Releases the cache, reporting a failed removal instead of ignoring it
    /// the way `Drop` has to.
    pub fn close(self) -> Result<()> {
        match self.dir {
            CacheDir::Temporary(temp) => {
                let path = temp.path().to_path_buf();
                tracing::debug!("Removing temporary cache directory: {}", path.display());
                temp.close()
                    .map_err(|e| RootstrapError::io_at("remove cache directory", &path, e))
            }
            CacheDir::Preserved(path) => {
                tracing::debug!("Keeping cache directory: {}", path.display());
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("dir", &self.get_dir())
            .field("preserved", &self.is_preserved())
            .finish()
    }
}
