//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Environment variable overriding the storage root
pub const HOME_ENV_VAR: &str = "TASKSHIP_HOME";

/// Storage layout for the CLI's per-user state
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Login profiles
    pub fn profiles_file(&self) -> File {
        File::new(self.base_dir.join("profiles.json"))
    }

    /// CLI diagnostic logs
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Saved image build logs
    pub fn build_logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("build-logs"))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR) {
            return Self::new(PathBuf::from(home));
        }

        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
            .join(".taskship");

        Self::new(base_dir)
    }
}
