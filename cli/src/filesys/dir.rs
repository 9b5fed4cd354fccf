//! Directory operations

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::fs;
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), DeployError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }
}

/// Build output directory owned by a single pipeline run.
///
/// Removed when dropped unless the run asked to keep it.
#[derive(Debug)]
pub struct BuildDir {
    inner: Option<TempDir>,
    path: PathBuf,
}

impl BuildDir {
    /// Create `<working_dir>/.taskship/tmp/build-XXXX`
    pub fn create(working_dir: &Path, keep: bool) -> Result<Self, DeployError> {
        let parent = working_dir.join(".taskship").join("tmp");
        std::fs::create_dir_all(&parent)?;

        let temp = tempfile::Builder::new().prefix("build-").tempdir_in(&parent)?;
        let path = temp.path().to_path_buf();
        debug!(path = %path.display(), keep, "Created build directory");

        let inner = if keep {
            // Detach so the directory survives for inspection
            let _ = temp.keep();
            None
        } else {
            Some(temp)
        };

        Ok(Self { inner, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory outlives this value
    pub fn is_kept(&self) -> bool {
        self.inner.is_none()
    }
}
