//! Command options and the validated deploy request

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};

use crate::storage::layout::StorageLayout;
use crate::storage::profiles::DEFAULT_PROFILE;

/// Process-wide options shared by every command
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Overrides the profile's API URL
    pub api_url: Option<String>,
    pub profile: String,
    pub layout: StorageLayout,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            api_url: None,
            profile: DEFAULT_PROFILE.to_string(),
            layout: StorageLayout::default(),
        }
    }
}

/// Environment a deploy targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetEnv {
    Prod,
    Staging,
    Preview,
}

impl TargetEnv {
    /// Slug used in API paths and env-var sync
    pub fn slug(&self) -> &'static str {
        match self {
            TargetEnv::Prod => "prod",
            TargetEnv::Staging => "staging",
            TargetEnv::Preview => "preview",
        }
    }

    /// Environment parameter of the dashboard test page
    pub fn test_param(&self) -> &'static str {
        match self {
            TargetEnv::Prod => "prod",
            _ => "stg",
        }
    }
}

/// Platform the image is built for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BuildPlatform {
    #[default]
    #[value(name = "linux/amd64")]
    LinuxAmd64,
    #[value(name = "linux/arm64")]
    LinuxArm64,
}

impl BuildPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPlatform::LinuxAmd64 => "linux/amd64",
            BuildPlatform::LinuxArm64 => "linux/arm64",
        }
    }
}

/// Networking mode for RUN instructions in a self-hosted build
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NetworkMode {
    Default,
    None,
    Host,
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkMode::Default => "default",
            NetworkMode::None => "none",
            NetworkMode::Host => "host",
        }
    }
}

/// Arguments of `taskship deploy`
#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    /// The path to the project
    #[arg(default_value = ".")]
    pub path: String,

    /// Deploy to a specific environment
    #[arg(short, long, value_enum, default_value = "prod")]
    pub env: TargetEnv,

    /// The preview branch to deploy to when passing --env preview. Detected from git when omitted.
    #[arg(short, long)]
    pub branch: Option<String>,

    /// The name of the config file, found at [path]
    #[arg(short, long)]
    pub config: Option<String>,

    /// The project ref. Overrides the project in the config file.
    #[arg(short, long)]
    pub project_ref: Option<String>,

    /// Build the project but do not deploy it
    #[arg(long)]
    pub dry_run: bool,

    /// Skip syncing environment variables declared by the build
    #[arg(long)]
    pub skip_sync_env_vars: bool,

    /// Skip promoting the deployment to the current deployment for the environment
    #[arg(long)]
    pub skip_promotion: bool,

    /// Skip checking the project's SDK version against the CLI
    #[arg(long)]
    pub skip_update_check: bool,

    /// Path to the .env file to load. Defaults to .env in the project directory.
    #[arg(long)]
    pub env_file: Option<String>,

    /// Build and load the image using your local Docker
    #[arg(long, hide = true)]
    pub self_hosted: bool,

    /// Do not use the cache when building the image
    #[arg(long, hide = true)]
    pub no_cache: bool,

    /// Push the self-hosted image to the registry
    #[arg(long, hide = true)]
    pub push: bool,

    /// The registry to push the image to when using --self-hosted
    #[arg(long, hide = true)]
    pub registry: Option<String>,

    /// (Coming soon) Tag to use when pushing the image
    #[arg(long, hide = true)]
    pub tag: Option<String>,

    /// The namespace to use when pushing the image to the registry
    #[arg(long, hide = true)]
    pub namespace: Option<String>,

    /// Load the built image into your local docker
    #[arg(long, hide = true)]
    pub load_image: bool,

    /// The platform to build the deployment image for
    #[arg(long, value_enum, default_value = "linux/amd64", hide = true)]
    pub build_platform: BuildPlatform,

    /// Save build logs even for successful builds
    #[arg(long, hide = true)]
    pub save_logs: bool,

    /// The networking mode for RUN instructions when using --self-hosted
    #[arg(long, value_enum)]
    pub network: Option<NetworkMode>,
}

impl DeployArgs {
    /// Resolve paths against `cwd` and freeze the request
    pub fn into_request(self, cwd: &Path) -> DeployRequest {
        let project_path = cwd.join(&self.path);
        // An explicit --push is implied by a registry override
        let push = self.push || self.registry.is_some();

        DeployRequest {
            dir: self.path,
            project_path,
            env: self.env,
            branch: self.branch.filter(|b| !b.trim().is_empty()),
            config: self.config,
            project_ref: self.project_ref,
            env_file: self.env_file,
            dry_run: self.dry_run,
            skip_sync_env_vars: self.skip_sync_env_vars,
            skip_promotion: self.skip_promotion,
            skip_update_check: self.skip_update_check,
            self_hosted: self.self_hosted,
            no_cache: self.no_cache,
            push,
            registry: self.registry,
            namespace: self.namespace,
            tag: self.tag,
            load_image: self.load_image,
            build_platform: self.build_platform,
            save_logs: self.save_logs,
            network: self.network,
        }
    }
}

/// Everything one deploy run is driven by. Not modified once built.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Directory argument as typed
    pub dir: String,
    pub project_path: PathBuf,
    pub env: TargetEnv,
    pub branch: Option<String>,
    pub config: Option<String>,
    pub project_ref: Option<String>,
    pub env_file: Option<String>,
    pub dry_run: bool,
    pub skip_sync_env_vars: bool,
    pub skip_promotion: bool,
    pub skip_update_check: bool,
    pub self_hosted: bool,
    pub no_cache: bool,
    pub push: bool,
    pub registry: Option<String>,
    pub namespace: Option<String>,
    pub tag: Option<String>,
    pub load_image: bool,
    pub build_platform: BuildPlatform,
    pub save_logs: bool,
    pub network: Option<NetworkMode>,
}

impl DeployRequest {
    /// A request for `project_path` with every flag at its default
    pub fn new(project_path: impl Into<PathBuf>, env: TargetEnv) -> Self {
        Self {
            dir: ".".to_string(),
            project_path: project_path.into(),
            env,
            branch: None,
            config: None,
            project_ref: None,
            env_file: None,
            dry_run: false,
            skip_sync_env_vars: false,
            skip_promotion: false,
            skip_update_check: false,
            self_hosted: false,
            no_cache: false,
            push: false,
            registry: None,
            namespace: None,
            tag: None,
            load_image: false,
            build_platform: BuildPlatform::default(),
            save_logs: false,
            network: None,
        }
    }
}
