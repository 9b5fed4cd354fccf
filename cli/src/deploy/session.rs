//! End-to-end deploy session
//!
//! Runs every stage in order and stops at the first failure. Failures that
//! happen before a deployment exists are returned directly. Once a
//! deployment exists, they go through [`fail_deploy`] so the remote status
//! decides how the failure is reported.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use openapi_client::models::{
    DeploymentType, FinalizeDeploymentRequest, InitializeDeploymentRequest,
};
use tracing::{debug, info, warn};

use crate::app::options::{DeployRequest, TargetEnv};
use crate::authn::login::{AuthContext, Authenticator};
use crate::deploy::branch::{archive_if_closed, resolve_branch, upsert_branch};
use crate::deploy::build_logs::save_logs;
use crate::deploy::bundle::{BundleRequest, Bundler};
use crate::deploy::coordinator::{BuildCoordinator, ImageOutcome};
use crate::deploy::docker::{ImageBuildRequest, ImageBuilder};
use crate::deploy::envsync::sync_env_vars;
use crate::deploy::failure::{fail_deploy, FailureOutput, LocalFailure};
use crate::deploy::git::VersionControl;
use crate::deploy::lifecycle::{InitializeError, LifecycleClient};
use crate::deploy::outputs::CiOutputs;
use crate::errors::{DeployError, ErrorKind};
use crate::filesys::dir::{BuildDir, Dir};
use crate::http::api::ProjectApi;
use crate::models::deployment::{
    prepare_deployment_error, Deployment, DeploymentStatus, GitMeta,
};
use crate::progress::ProgressSink;
use crate::reporter::Reporter;
use crate::storage::dotenv::load_env_file;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{load_config, ResolvedConfig};
use crate::utils::{pluralize, version_info};

/// Variable naming the project ref, read from the process env or the env file
pub const PROJECT_REF_ENV_VAR: &str = "TASKSHIP_PROJECT_REF";

/// What a finished run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySummary {
    pub version: String,
    pub short_code: String,
    pub deployment_url: String,
    pub test_url: String,
    pub task_count: usize,
    pub needs_promotion: bool,
    /// Warnings found in the image build logs
    pub warnings: Vec<String>,
}

/// Terminal outcome of a run that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Deployed(DeploySummary),
    /// The control plane already has a deployed version of this build
    AlreadyDeployed(DeploySummary),
    /// Bundled only; the build directory is left for inspection
    DryRun { destination: PathBuf },
    /// The preview branch's pull request is finished; nothing was deployed
    Archived { branch: String, archived: bool },
}

/// Dashboard page for a deployment
pub fn deployment_url(dashboard_url: &str, project_ref: &str, short_code: &str) -> String {
    format!(
        "{}/projects/v3/{}/deployments/{}",
        dashboard_url, project_ref, short_code
    )
}

/// Dashboard page for testing tasks in an environment
pub fn test_url(dashboard_url: &str, project_ref: &str, env: TargetEnv) -> String {
    format!(
        "{}/projects/v3/{}/test?environment={}",
        dashboard_url,
        project_ref,
        env.test_param()
    )
}

/// Reference finalize sends to the control plane
pub fn image_reference(
    self_hosted: bool,
    registry_host: Option<&str>,
    image: &str,
    digest: Option<&str>,
) -> String {
    let digest = digest.map(|d| format!("@{}", d)).unwrap_or_default();
    match (self_hosted, registry_host) {
        (true, Some(host)) if !host.is_empty() => format!("{}/{}{}", host, image, digest),
        _ => format!("{}{}", image, digest),
    }
}

/// Reject a directory argument that does not exist, with hints for common
/// mistakes like passing the environment as the path.
pub async fn verify_directory(dir: &str, project_path: &Path) -> Result<(), DeployError> {
    if dir == "." || Dir::new(project_path).exists().await {
        return Ok(());
    }

    let message = match dir {
        "staging" | "prod" | "preview" => format!(
            "To deploy to {}, you need to pass \"--env {}\", not just \"{}\".",
            dir, dir, dir
        ),
        "production" => {
            "To deploy to production, you need to pass \"--env prod\", not \"production\"."
                .to_string()
        }
        "stg" => "To deploy to staging, you need to pass \"--env staging\", not \"stg\".".to_string(),
        _ => format!(
            "Directory \"{}\" not found at {}",
            dir,
            project_path.display()
        ),
    };
    Err(DeployError::Validation(message))
}

/// Compare the project's SDK version with this CLI
pub fn sdk_version_warning(config: &ResolvedConfig) -> Option<String> {
    let sdk = config.settings.sdk_version.as_deref()?.trim_start_matches('^');
    let cli = version_info().version;
    (sdk != cli).then(|| {
        format!(
            "This project uses SDK version {} but the CLI is version {}. Update them to the same version to avoid build issues.",
            sdk, cli
        )
    })
}

/// Orchestrates one deploy. Collaborators are injected so the whole
/// pipeline can run against fakes.
pub struct Session {
    authenticator: Arc<dyn Authenticator>,
    vcs: Arc<dyn VersionControl>,
    bundler: Arc<dyn Bundler>,
    image_builder: Arc<dyn ImageBuilder>,
    layout: StorageLayout,
    reporter: Reporter,
    progress: ProgressSink,
    env_project_ref: Option<String>,
    write_ci_outputs: bool,
}

impl Session {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        vcs: Arc<dyn VersionControl>,
        bundler: Arc<dyn Bundler>,
        image_builder: Arc<dyn ImageBuilder>,
    ) -> Self {
        Self {
            authenticator,
            vcs,
            bundler,
            image_builder,
            layout: StorageLayout::default(),
            reporter: Reporter::new(),
            progress: ProgressSink::disabled(),
            env_project_ref: None,
            write_ci_outputs: false,
        }
    }

    pub fn with_layout(mut self, layout: StorageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Project ref taken from the process environment
    pub fn with_env_project_ref(mut self, project_ref: Option<String>) -> Self {
        self.env_project_ref = project_ref.filter(|p| !p.is_empty());
        self
    }

    /// Append outputs to `GITHUB_ENV` / `GITHUB_OUTPUT` after a deploy
    pub fn with_ci_outputs(mut self, enabled: bool) -> Self {
        self.write_ci_outputs = enabled;
        self
    }

    fn failure_output(&self) -> FailureOutput<'_> {
        FailureOutput {
            reporter: &self.reporter,
            layout: &self.layout,
        }
    }

    pub async fn run(&self, request: &DeployRequest) -> Result<DeployOutcome, DeployError> {
        verify_directory(&request.dir, &request.project_path).await?;
        self.reporter.intro("Deploying project");

        if request.tag.is_some() {
            self.reporter
                .warn("--tag is not supported yet and will be ignored");
        }

        let env_file_vars =
            load_env_file(&request.project_path, request.env_file.as_deref()).await?;
        let project_override = request
            .project_ref
            .clone()
            .or_else(|| self.env_project_ref.clone())
            .or_else(|| env_file_vars.get(PROJECT_REF_ENV_VAR).cloned());
        let config = load_config(
            &request.project_path,
            request.config.as_deref(),
            project_override,
        )
        .await?;
        debug!(project = %config.project, working_dir = %config.working_dir.display(), "Resolved config");

        if !request.skip_update_check {
            if let Some(warning) = sdk_version_warning(&config) {
                self.reporter.warn(&warning);
            }
        }

        let git_meta = self.vcs.git_meta(&config.working_dir).await;
        let branch = resolve_branch(request, &git_meta)?;

        let auth = self.authenticator.authenticate().await?;

        if let Some(branch) = &branch {
            let account = auth.account.as_ref();
            if let Some(archived) =
                archive_if_closed(account, &config.project, branch, &git_meta).await
            {
                if archived {
                    self.reporter
                        .outro(&format!("Preview branch \"{}\" archived", branch));
                } else {
                    self.reporter.outro_error(
                        "Error",
                        &format!("Failed to archive preview branch \"{}\"", branch),
                    );
                }
                return Ok(DeployOutcome::Archived {
                    branch: branch.clone(),
                    archived,
                });
            }

            let environment = upsert_branch(account, &config.project, branch, &git_meta).await?;
            self.reporter.step(&format!(
                "Using preview branch \"{}\"",
                environment.branch_name.as_deref().unwrap_or(branch)
            ));
        }

        let project = auth
            .account
            .connect_project(&config.project, request.env.slug(), branch.as_deref())
            .await
            .map_err(|e| {
                DeployError::Auth(format!(
                    "Failed to connect to project {} ({}): {}",
                    config.project,
                    request.env.slug(),
                    e
                ))
            })?;
        let api = project.api.clone();
        debug!(project_id = %project.id, api_url = %project.api_url, "Connected to project");

        let server_env_vars = match api.get_environment_variables(&config.project).await {
            Ok(response) => response.variables,
            Err(e) => {
                warn!("Failed to fetch environment variables: {}", e);
                BTreeMap::new()
            }
        };

        let build_dir = BuildDir::create(&config.working_dir, request.dry_run)?;
        let externals = resolve_externals(api.as_ref(), &config).await;

        let coordinator = BuildCoordinator::new(
            self.bundler.clone(),
            self.image_builder.clone(),
            self.progress.clone(),
        );

        self.reporter.step("Building project");
        let manifest = coordinator
            .bundle(&BundleRequest {
                project_ref: config.project.clone(),
                bundler: config.settings.bundler.clone(),
                working_dir: config.working_dir.clone(),
                config_file: config.config_file.clone(),
                env_slug: request.env.slug().to_string(),
                branch: branch.clone(),
                destination: build_dir.path().to_path_buf(),
                externals,
                env_vars: env_file_vars,
                server_env_vars: server_env_vars.clone(),
            })
            .await?;
        self.reporter.success("Successfully built project");

        if request.dry_run {
            self.reporter.outro(&format!(
                "Dry run complete. View the built project at {}",
                build_dir.path().display()
            ));
            return Ok(DeployOutcome::DryRun {
                destination: build_dir.path().to_path_buf(),
            });
        }

        let mut lifecycle = LifecycleClient::new(api.clone());
        let deployment = self
            .initialize(&mut lifecycle, request, &config, &auth, &manifest.content_hash, &git_meta)
            .await?;

        let summary_for = |deployment: &Deployment, warnings: Vec<String>| DeploySummary {
            version: deployment.version.clone(),
            short_code: deployment.short_code.clone(),
            deployment_url: deployment_url(
                &auth.dashboard_url,
                &config.project,
                &deployment.short_code,
            ),
            test_url: test_url(&auth.dashboard_url, &config.project, request.env),
            task_count: deployment.worker.as_ref().map(|w| w.tasks.len()).unwrap_or(0),
            needs_promotion: request.skip_promotion,
            warnings,
        };

        if deployment.status == DeploymentStatus::Deployed {
            let summary = summary_for(&deployment, Vec::new());
            self.reporter.outro(&format!(
                "Version {} is already deployed | {}",
                summary.version, summary.deployment_url
            ));
            self.export(&summary).await;
            return Ok(DeployOutcome::AlreadyDeployed(summary));
        }

        let link = deployment_url(&auth.dashboard_url, &config.project, &deployment.short_code);
        self.reporter
            .step(&format!("Deploying version {} {}", deployment.version, link));
        let output = self.failure_output();

        if let Err(e) = coordinator.ensure_toolchain(request.self_hosted).await {
            let failure = LocalFailure::new(ErrorKind::Build, "BuildError", e.to_string());
            return Err(fail_deploy(&mut lifecycle, &deployment, failure, &output).await);
        }

        if let Some(payload) = manifest.sync_payload() {
            let count = pluralize(payload.len(), "env var");
            if request.skip_sync_env_vars {
                self.reporter
                    .warn(&format!("Skipping syncing {} with the server", count));
            } else {
                let outcome = sync_env_vars(
                    api.as_ref(),
                    &config.project,
                    request.env.slug(),
                    payload,
                    &server_env_vars,
                )
                .await;
                if !outcome.success {
                    let failure = LocalFailure::new(
                        ErrorKind::Sync,
                        "SyncEnvVarsError",
                        format!("Failed to sync {} with the server", count),
                    );
                    return Err(fail_deploy(&mut lifecycle, &deployment, failure, &output).await);
                }
                self.reporter
                    .success(&format!("Successfully synced {} with the server", count));
            }
        }

        let registry_host = if request.self_hosted {
            deployment
                .registry_host
                .clone()
                .or_else(|| request.registry.clone())
        } else {
            deployment.registry_host.clone()
        };

        let image_request = ImageBuildRequest {
            self_hosted: request.self_hosted,
            project_ref: config.project.clone(),
            content_hash: manifest.content_hash.clone(),
            image_tag: deployment.image_tag.clone(),
            compilation_path: build_dir.path().to_path_buf(),
            platform: request.build_platform,
            no_cache: request.no_cache,
            push: request.push,
            load_image: request.load_image,
            registry_host: registry_host.clone(),
            namespace: request.namespace.clone(),
            network: request.network,
            external_build: deployment.external_build_data.clone(),
            build_env_vars: manifest.build.env.clone(),
        };

        let (result, scan) = match coordinator.build_image(&image_request).await {
            ImageOutcome::Built { result, scan } => (result, scan),
            ImageOutcome::LogErrors { result, scan } => {
                let failure =
                    LocalFailure::new(ErrorKind::Build, "BuildError", scan.summary.clone())
                        .with_logs(result.logs)
                        .with_scan(scan.warnings, scan.errors);
                return Err(fail_deploy(&mut lifecycle, &deployment, failure, &output).await);
            }
            ImageOutcome::Failed { result, scan } => {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Failed to build image".to_string());
                let failure = LocalFailure::new(ErrorKind::Build, "BuildError", message)
                    .with_logs(result.logs)
                    .with_scan(scan.warnings, Vec::new());
                return Err(fail_deploy(&mut lifecycle, &deployment, failure, &output).await);
            }
        };

        let with_worker = match lifecycle.fetch(&deployment.id).await {
            Ok(fetched) if fetched.worker.is_some() => fetched,
            Ok(fetched) => {
                let message = fetched
                    .error_data
                    .as_ref()
                    .and_then(prepare_deployment_error)
                    .map(|data| data.message)
                    .unwrap_or_else(|| "Failed to get deployment with worker".to_string());
                let failure = LocalFailure::new(ErrorKind::Deployment, "DeploymentError", message)
                    .with_logs(result.logs.clone())
                    .with_scan(scan.warnings.clone(), Vec::new());
                return Err(fail_deploy(&mut lifecycle, &deployment, failure, &output).await);
            }
            Err(e) => {
                let failure =
                    LocalFailure::new(ErrorKind::Deployment, "DeploymentError", e.message)
                        .with_logs(result.logs.clone())
                        .with_scan(scan.warnings.clone(), Vec::new());
                return Err(fail_deploy(&mut lifecycle, &deployment, failure, &output).await);
            }
        };

        let finalize_request = FinalizeDeploymentRequest {
            image_reference: image_reference(
                request.self_hosted,
                registry_host.as_deref(),
                &result.image,
                result.digest.as_deref(),
            ),
            self_hosted: request.self_hosted,
            skip_promotion: request.skip_promotion,
        };
        info!(image_reference = %finalize_request.image_reference, "Finalizing deployment");

        if let Err(e) = lifecycle
            .finalize(&deployment.id, &finalize_request, &self.progress)
            .await
        {
            let failure = LocalFailure::new(ErrorKind::Deployment, "FinalizeError", e.message)
                .with_logs(result.logs.clone())
                .with_scan(scan.warnings.clone(), Vec::new());
            return Err(fail_deploy(&mut lifecycle, &deployment, failure, &output).await);
        }

        if request.save_logs && !result.logs.trim().is_empty() {
            match save_logs(&self.layout, &deployment.short_code, &result.logs).await {
                Ok(path) => self
                    .reporter
                    .message(&format!("Build logs saved to {}", path.display())),
                Err(e) => warn!("Failed to save build logs: {}", e),
            }
        }

        let summary = summary_for(&with_worker, scan.warnings);
        self.reporter.print_warnings(&summary.warnings);
        self.reporter.outro(&format!(
            "Version {} deployed with {} | {} | {}",
            summary.version,
            pluralize(summary.task_count, "detected task"),
            summary.deployment_url,
            summary.test_url
        ));
        self.export(&summary).await;

        Ok(DeployOutcome::Deployed(summary))
    }

    async fn initialize(
        &self,
        lifecycle: &mut LifecycleClient,
        request: &DeployRequest,
        config: &ResolvedConfig,
        auth: &AuthContext,
        content_hash: &str,
        git_meta: &GitMeta,
    ) -> Result<Deployment, DeployError> {
        let init_request = InitializeDeploymentRequest {
            content_hash: content_hash.to_string(),
            user_id: Some(auth.user_id.clone()),
            self_hosted: request.self_hosted,
            registry_host: request.registry.clone(),
            namespace: request.namespace.clone(),
            git_meta: Some(git_meta.clone()),
            deployment_type: if config.settings.features.run_engine_v2 {
                DeploymentType::Managed
            } else {
                DeploymentType::V1
            },
        };

        match lifecycle.initialize(&init_request).await {
            Ok(deployment) => Ok(deployment),
            Err(InitializeError::Rejected(e)) => Err(DeployError::Deployment(format!(
                "Failed to start deployment: {}",
                e
            ))),
            Err(ref err @ InitializeError::NoBuildPath(ref deployment)) => {
                let failure =
                    LocalFailure::new(ErrorKind::Deployment, "DeploymentError", err.to_string());
                Err(fail_deploy(lifecycle, deployment, failure, &self.failure_output()).await)
            }
        }
    }

    async fn export(&self, summary: &DeploySummary) {
        if !self.write_ci_outputs {
            return;
        }
        if let Err(e) = CiOutputs::from_summary(summary).write_from_env().await {
            warn!("Failed to write CI outputs: {}", e);
        }
    }
}

/// Server-forced externals plus the project's own
async fn resolve_externals(api: &dyn ProjectApi, config: &ResolvedConfig) -> Vec<String> {
    let mut externals = match api.forced_externals().await {
        Ok(response) => response.externals,
        Err(e) => {
            warn!("Failed to fetch forced externals: {}", e);
            Vec::new()
        }
    };

    for external in &config.settings.build.external {
        if !externals.contains(external) {
            externals.push(external.clone());
        }
    }
    externals
}
