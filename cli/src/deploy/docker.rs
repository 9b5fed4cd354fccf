//! Container image builds
//!
//! Self-hosted builds run `docker buildx` on the caller's machine. Hosted
//! builds run the `depot` CLI against the remote builder whose credentials
//! come back from initialize.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::options::{BuildPlatform, NetworkMode};
use crate::errors::DeployError;
use crate::models::deployment::ExternalBuildData;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::utils::next_line_lossy;

/// Registry used when the control plane does not name one
pub const DEFAULT_REGISTRY_HOST: &str = "registry.taskship.dev";

/// Containerfile written by the bundler into the build directory
pub const CONTAINERFILE: &str = "Containerfile";

const METADATA_FILE: &str = "image-metadata.json";
const BUILDX_INSTALL_URL: &str = "https://github.com/docker/buildx#installing";

/// Inputs for one image build
#[derive(Debug, Clone)]
pub struct ImageBuildRequest {
    pub self_hosted: bool,
    pub project_ref: String,
    pub content_hash: String,
    /// Tag assigned by the control plane
    pub image_tag: String,
    /// Bundle output; used as the build context
    pub compilation_path: PathBuf,
    pub platform: BuildPlatform,
    pub no_cache: bool,
    pub push: bool,
    pub load_image: bool,
    pub registry_host: Option<String>,
    pub namespace: Option<String>,
    pub network: Option<NetworkMode>,
    /// Hosted builder credentials
    pub external_build: Option<ExternalBuildData>,
    pub build_env_vars: BTreeMap<String, String>,
}

impl ImageBuildRequest {
    /// Image name without a registry for self-hosted builds, with one otherwise
    pub fn image_name(&self) -> String {
        let repository = match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{}/{}", ns.trim_matches('/'), self.project_ref),
            _ => self.project_ref.clone(),
        };
        let image = format!("{}:{}", repository, self.image_tag);

        if self.self_hosted {
            image
        } else {
            let host = self.registry_host.as_deref().unwrap_or(DEFAULT_REGISTRY_HOST);
            format!("{}/{}", host, image)
        }
    }

    /// Fully qualified tag handed to the builder
    pub fn tag(&self) -> String {
        match (&self.registry_host, self.self_hosted) {
            (Some(host), true) => format!("{}/{}", host, self.image_name()),
            _ => self.image_name(),
        }
    }
}

/// Outcome reported by the builder itself, before any log scanning
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    /// The builder exited successfully
    pub ok: bool,
    pub image: String,
    pub digest: Option<String>,
    /// Everything the builder printed
    pub logs: String,
    /// Failure description when not `ok`
    pub error: Option<String>,
}

#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Check that the local toolchain for a self-hosted build is installed
    async fn probe_toolchain(&self) -> Result<(), DeployError>;

    /// Build and optionally push the image. Each output line is sent to
    /// `progress` as it arrives.
    async fn build(&self, request: &ImageBuildRequest, progress: &ProgressSink) -> BuildResult;
}

/// Builds images with `docker buildx` or `depot`
#[derive(Debug, Clone)]
pub struct DockerImageBuilder {
    docker: String,
    depot: String,
}

impl Default for DockerImageBuilder {
    fn default() -> Self {
        Self {
            docker: "docker".to_string(),
            depot: "depot".to_string(),
        }
    }
}

impl DockerImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn common_args(request: &ImageBuildRequest, metadata: &Path) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "--platform".to_string(),
            request.platform.as_str().to_string(),
            "--provenance".to_string(),
            "false".to_string(),
            "--metadata-file".to_string(),
            metadata.display().to_string(),
        ];
        if request.no_cache {
            args.push("--no-cache".to_string());
        }

        let build_args = [
            ("TASKSHIP_PROJECT_REF", request.project_ref.as_str()),
            ("TASKSHIP_CONTENT_HASH", request.content_hash.as_str()),
        ];
        for (key, value) in build_args {
            args.extend(["--build-arg".to_string(), format!("{}={}", key, value)]);
        }
        for (key, value) in &request.build_env_vars {
            args.extend(["--build-arg".to_string(), format!("{}={}", key, value)]);
        }

        args.extend([
            "-t".to_string(),
            request.tag(),
            "-f".to_string(),
            request.compilation_path.join(CONTAINERFILE).display().to_string(),
        ]);
        args
    }

    /// `docker buildx build ...` for a local build
    pub fn self_hosted_args(request: &ImageBuildRequest, metadata: &Path) -> Vec<String> {
        let mut args = vec!["buildx".to_string()];
        args.extend(Self::common_args(request, metadata));

        if let Some(network) = request.network {
            args.extend(["--network".to_string(), network.as_str().to_string()]);
        }
        if request.push {
            args.push("--push".to_string());
        }
        if request.load_image || !request.push {
            args.push("--load".to_string());
        }
        args.push(request.compilation_path.display().to_string());
        args
    }

    /// `depot build ...` for the hosted builder
    pub fn remote_args(request: &ImageBuildRequest, metadata: &Path) -> Vec<String> {
        let mut args = Self::common_args(request, metadata);
        args.push("--push".to_string());
        if request.load_image {
            args.push("--load".to_string());
        }
        args.push(request.compilation_path.display().to_string());
        args
    }
}

#[async_trait]
impl ImageBuilder for DockerImageBuilder {
    async fn probe_toolchain(&self) -> Result<(), DeployError> {
        let missing = || DeployError::MissingToolchain {
            tool: "docker buildx".to_string(),
            install_url: BUILDX_INSTALL_URL.to_string(),
        };

        let output = Command::new(&self.docker)
            .args(["buildx", "version"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|_| missing())?;

        if !output.status.success() {
            return Err(missing());
        }
        debug!(
            "Found {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    async fn build(&self, request: &ImageBuildRequest, progress: &ProgressSink) -> BuildResult {
        let image = request.image_name();
        let metadata = request.compilation_path.join(METADATA_FILE);

        let mut command = if request.self_hosted {
            let mut command = Command::new(&self.docker);
            command.args(Self::self_hosted_args(request, &metadata));
            command
        } else {
            let Some(external) = &request.external_build else {
                return BuildResult {
                    ok: false,
                    image,
                    error: Some("Missing remote build credentials".to_string()),
                    ..BuildResult::default()
                };
            };
            let mut command = Command::new(&self.depot);
            command
                .args(Self::remote_args(request, &metadata))
                .env("DEPOT_BUILD_ID", &external.build_id)
                .env("DEPOT_TOKEN", &external.build_token)
                .env("DEPOT_PROJECT_ID", &external.project_id);
            command
        };

        info!(image = %image, self_hosted = request.self_hosted, "Building image");
        let (status, logs) = match run_streaming(&mut command, progress).await {
            Ok(result) => result,
            Err(e) => {
                return BuildResult {
                    ok: false,
                    image,
                    error: Some(format!("Failed to start image build: {}", e)),
                    ..BuildResult::default()
                }
            }
        };

        let digest = match tokio::fs::read_to_string(&metadata).await {
            Ok(contents) => digest_from_metadata(&contents),
            Err(_) => None,
        }
        .or_else(|| parse_digest(&logs));

        let error = (!status.success()).then(|| format!("Image build exited with {}", status));
        BuildResult {
            ok: status.success(),
            image,
            digest,
            logs,
            error,
        }
    }
}

/// Run a command, forwarding stdout and stderr lines as they arrive
async fn run_streaming(
    command: &mut Command,
    progress: &ProgressSink,
) -> std::io::Result<(ExitStatus, String)> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, tx.clone()));
    }
    drop(tx);

    let mut logs = String::new();
    while let Some(line) = rx.recv().await {
        logs.push_str(&line);
        logs.push('\n');
        progress.emit(ProgressEvent::BuildLog(line));
    }

    let status = child.wait().await?;
    Ok((status, logs))
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        match next_line_lossy(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped reading build output: {}", e);
                break;
            }
        }
    }
}

fn digest_from_metadata(contents: &str) -> Option<String> {
    let metadata: Value = serde_json::from_str(contents).ok()?;
    metadata
        .get("containerimage.digest")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Find the pushed manifest digest in builder output
pub fn parse_digest(logs: &str) -> Option<String> {
    let extract = |line: &str| {
        let start = line.find("sha256:")?;
        let digest: String = line[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == ':')
            .collect();
        (digest.len() == "sha256:".len() + 64).then_some(digest)
    };

    logs.lines()
        .filter(|l| l.contains("@sha256:") || l.contains("exporting manifest list sha256:"))
        .filter_map(extract)
        .last()
        .or_else(|| {
            logs.lines()
                .filter(|l| l.contains("exporting manifest sha256:"))
                .filter_map(extract)
                .last()
        })
}
