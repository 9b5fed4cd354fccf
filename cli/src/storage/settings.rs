//! Project configuration file

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;

/// Default config file name, looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "taskship.json";

/// Bundler invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerSettings {
    /// Executable to run
    #[serde(default = "default_bundler_command")]
    pub command: String,

    /// Arguments placed before the generated ones
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_bundler_command() -> String {
    "taskship-bundle".to_string()
}

impl Default for BundlerSettings {
    fn default() -> Self {
        Self {
            command: default_bundler_command(),
            args: Vec::new(),
        }
    }
}

/// Build settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSettings {
    /// Packages that must stay external in addition to the server's list
    #[serde(default)]
    pub external: Vec<String>,
}

/// Feature flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSettings {
    #[serde(default)]
    pub run_engine_v2: bool,
}

/// Project settings as stored in `taskship.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default)]
    pub project: Option<String>,

    /// Directories containing task definitions
    #[serde(default)]
    pub dirs: Vec<String>,

    /// Repository root, relative to the project directory
    #[serde(default)]
    pub workspace_dir: Option<String>,

    #[serde(default)]
    pub features: FeatureSettings,

    #[serde(default)]
    pub bundler: BundlerSettings,

    #[serde(default)]
    pub build: BuildSettings,

    /// SDK version the project was written against
    #[serde(default)]
    pub sdk_version: Option<String>,
}

/// Fully resolved project configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub project: String,
    pub working_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub config_file: Option<PathBuf>,
    pub settings: ProjectSettings,
}

/// Load the project config.
///
/// An explicitly named config file must exist. Without one, a missing
/// default file is fine as long as the project ref comes from elsewhere.
pub async fn load_config(
    working_dir: &Path,
    config_file: Option<&str>,
    project_override: Option<String>,
) -> Result<ResolvedConfig, DeployError> {
    let (file, explicit) = match config_file {
        Some(name) => (File::new(working_dir.join(name)), true),
        None => (File::new(working_dir.join(CONFIG_FILE_NAME)), false),
    };

    let settings = if file.exists().await {
        debug!(path = %file.path().display(), "Loading project config");
        file.read_json::<ProjectSettings>().await.map_err(|e| {
            DeployError::Validation(format!(
                "Invalid config file {}: {}",
                file.path().display(),
                e
            ))
        })?
    } else if explicit {
        return Err(DeployError::Validation(format!(
            "Config file not found at {}",
            file.path().display()
        )));
    } else {
        ProjectSettings::default()
    };

    let project = project_override
        .filter(|p| !p.is_empty())
        .or_else(|| settings.project.clone())
        .ok_or_else(|| {
            DeployError::Validation(format!(
                "No project ref found. Add \"project\" to {} or pass --project-ref.",
                CONFIG_FILE_NAME
            ))
        })?;

    let workspace_dir = settings
        .workspace_dir
        .as_ref()
        .map(|dir| working_dir.join(dir))
        .unwrap_or_else(|| working_dir.to_path_buf());

    let exists = file.exists().await;
    Ok(ResolvedConfig {
        project,
        working_dir: working_dir.to_path_buf(),
        workspace_dir,
        config_file: exists.then(|| file.path().to_path_buf()),
        settings,
    })
}
