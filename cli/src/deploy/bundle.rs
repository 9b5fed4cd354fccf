//! Bundler invocation
//!
//! The bundler is an external program. It compiles the project into a build
//! directory and describes the output in `build-manifest.json`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::models::manifest::BuildManifest;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::storage::settings::BundlerSettings;
use crate::utils::next_line_lossy;

pub const MANIFEST_FILE_NAME: &str = "build-manifest.json";

const BUNDLE_START_MARKER: &str = "::bundle-start::";
const BUNDLE_COMPLETE_MARKER: &str = "::bundle-complete::";

/// Inputs for one bundle
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub project_ref: String,
    /// Bundler command from the project config
    pub bundler: BundlerSettings,
    pub working_dir: PathBuf,
    pub config_file: Option<PathBuf>,
    pub env_slug: String,
    pub branch: Option<String>,
    pub destination: PathBuf,
    /// Packages left out of the bundle and installed in the image
    pub externals: Vec<String>,
    /// Variables from the env file
    pub env_vars: BTreeMap<String, String>,
    /// Variables already stored on the control plane
    pub server_env_vars: BTreeMap<String, String>,
}

#[async_trait]
pub trait Bundler: Send + Sync {
    /// Produce a build in `request.destination`. Progress events are
    /// informational only.
    async fn bundle(
        &self,
        request: &BundleRequest,
        progress: &ProgressSink,
    ) -> Result<BuildManifest, DeployError>;
}

/// Runs the configured bundler command as a child process
#[derive(Debug, Clone, Default)]
pub struct ProcessBundler;

impl ProcessBundler {
    /// Configured arguments followed by the generated ones
    pub fn args(request: &BundleRequest) -> Vec<String> {
        let mut args = request.bundler.args.clone();
        args.extend([
            "--target".to_string(),
            "deploy".to_string(),
            "--env".to_string(),
            request.env_slug.clone(),
        ]);
        if let Some(branch) = &request.branch {
            args.extend(["--branch".to_string(), branch.clone()]);
        }
        if let Some(config) = &request.config_file {
            args.extend(["--config".to_string(), config.display().to_string()]);
        }
        args.extend([
            "--out".to_string(),
            request.destination.display().to_string(),
        ]);
        for external in &request.externals {
            args.extend(["--external".to_string(), external.clone()]);
        }
        args
    }
}

#[async_trait]
impl Bundler for ProcessBundler {
    async fn bundle(
        &self,
        request: &BundleRequest,
        progress: &ProgressSink,
    ) -> Result<BuildManifest, DeployError> {
        let command = &request.bundler.command;
        let args = Self::args(request);
        info!(command = %command, "Bundling project");
        debug!("Bundler args: {:?}", args);

        let server_env = serde_json::to_string(&request.server_env_vars)?;
        let mut child = Command::new(command)
            .args(&args)
            .current_dir(&request.working_dir)
            .envs(&request.env_vars)
            .env("TASKSHIP_PROJECT_REF", &request.project_ref)
            .env("TASKSHIP_SERVER_ENV_JSON", server_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DeployError::Build(format!(
                    "Failed to run bundler `{}`: {}",
                    command, e
                ))
            })?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    debug!("Failed to read bundler stderr: {}", e);
                }
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            while let Some(line) = next_line_lossy(&mut reader, &mut buf).await? {
                match line.trim() {
                    BUNDLE_START_MARKER => progress.emit(ProgressEvent::BundleStarted),
                    BUNDLE_COMPLETE_MARKER => progress.emit(ProgressEvent::BundleCompleted),
                    other => debug!("bundler: {}", other),
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            let detail = stderr.trim();
            return Err(DeployError::Build(if detail.is_empty() {
                format!("Bundler exited with {}", status)
            } else {
                format!("Build failed: {}", detail)
            }));
        }

        let manifest_file = File::new(request.destination.join(MANIFEST_FILE_NAME));
        if !manifest_file.exists().await {
            return Err(DeployError::Build(format!(
                "Bundler did not write {}",
                manifest_file.path().display()
            )));
        }

        manifest_file.read_json::<BuildManifest>().await.map_err(|e| {
            DeployError::Build(format!("Invalid build manifest: {}", e))
        })
    }
}
