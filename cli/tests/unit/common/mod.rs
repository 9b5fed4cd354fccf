//! In-memory collaborators that record every call

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use openapi_client::models::{
    ArchiveBranchResponse, BranchEnvironment, Deployment, DeploymentStatus, DeploymentWorker,
    EnvironmentVariablesResponse, ExternalBuildData, ExternalsResponse, FailDeploymentRequest,
    FailDeploymentResponse, FinalizeDeploymentRequest, FinalizeDeploymentResponse, GitMeta,
    ImportEnvVarsRequest, ImportEnvVarsResponse, InitializeDeploymentRequest, UpsertBranchRequest,
    UpsertBranchResponse, WhoAmIResponse, WorkerTask,
};
use tempfile::TempDir;

use taskship::app::options::{DeployRequest, TargetEnv};
use taskship::authn::login::{AuthContext, Authenticator};
use taskship::deploy::bundle::{BundleRequest, Bundler};
use taskship::deploy::docker::{BuildResult, ImageBuildRequest, ImageBuilder};
use taskship::deploy::git::VersionControl;
use taskship::deploy::session::Session;
use taskship::errors::DeployError;
use taskship::http::api::{AccountApi, ApiError, ApiResult, ProjectApi, ProjectClient};
use taskship::models::manifest::{BuildManifest, SyncPayload};
use taskship::progress::ProgressSink;
use taskship::reporter::Reporter;
use taskship::storage::layout::StorageLayout;

pub const PROJECT_REF: &str = "proj_test";
pub const DASHBOARD_URL: &str = "https://app.taskship.test";

/// A remote call as seen by the fakes
#[derive(Debug, Clone)]
pub enum Call {
    Authenticate,
    UpsertBranch(String),
    ArchiveBranch(String),
    ConnectProject { env: String, branch: Option<String> },
    GetEnvironmentVariables,
    ForcedExternals,
    Initialize,
    GetDeployment,
    Finalize(FinalizeDeploymentRequest),
    Fail(FailDeploymentRequest),
    ImportEnvVars(ImportEnvVarsRequest),
}

/// Control-plane behaviour for one test
#[derive(Debug, Clone)]
pub struct PlaneConfig {
    pub initialize_status: DeploymentStatus,
    pub initialize_fails: bool,
    pub external_build: bool,
    /// Status returned by `get_deployment`
    pub remote_status: DeploymentStatus,
    pub remote_error: Option<serde_json::Value>,
    pub with_worker: bool,
    pub get_fails: bool,
    pub finalize_fails: bool,
    pub import_succeeds: bool,
    pub upsert_returns_branch: bool,
    pub archived: bool,
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            initialize_status: DeploymentStatus::Pending,
            initialize_fails: false,
            external_build: true,
            remote_status: DeploymentStatus::Building,
            remote_error: None,
            with_worker: true,
            get_fails: false,
            finalize_fails: false,
            import_succeeds: true,
            upsert_returns_branch: true,
            archived: true,
        }
    }
}

pub fn deployment(status: DeploymentStatus) -> Deployment {
    Deployment {
        id: "dep_1".to_string(),
        short_code: "k2x9q".to_string(),
        version: "20261016.1".to_string(),
        status,
        content_hash: "hash_1".to_string(),
        external_build_data: None,
        image_tag: "20261016.1".to_string(),
        registry_host: None,
        error_data: None,
        worker: None,
    }
}

fn worker() -> DeploymentWorker {
    let task = |slug: &str| WorkerTask {
        id: format!("task_{}", slug),
        slug: slug.to_string(),
        file_path: Some("src/tasks.ts".to_string()),
        export_name: Some(slug.to_string()),
    };
    DeploymentWorker {
        id: "worker_1".to_string(),
        version: "20261016.1".to_string(),
        tasks: vec![task("send-email"), task("resize-image")],
    }
}

pub struct FakeControlPlane {
    pub config: PlaneConfig,
    status: Mutex<DeploymentStatus>,
    calls: Mutex<Vec<Call>>,
}

impl FakeControlPlane {
    pub fn new(config: PlaneConfig) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(config.remote_status),
            config,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    pub fn fail_requests(&self) -> Vec<FailDeploymentRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fail(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn status(&self) -> DeploymentStatus {
        *self.status.lock().unwrap()
    }
}

#[async_trait]
impl ProjectApi for FakeControlPlane {
    async fn get_environment_variables(
        &self,
        _project_ref: &str,
    ) -> ApiResult<EnvironmentVariablesResponse> {
        self.record(Call::GetEnvironmentVariables);
        Ok(EnvironmentVariablesResponse {
            variables: BTreeMap::from([("DATABASE_URL".to_string(), "postgres://db".to_string())]),
        })
    }

    async fn forced_externals(&self) -> ApiResult<ExternalsResponse> {
        self.record(Call::ForcedExternals);
        Ok(ExternalsResponse {
            externals: vec!["sharp".to_string()],
        })
    }

    async fn initialize_deployment(
        &self,
        request: &InitializeDeploymentRequest,
    ) -> ApiResult<Deployment> {
        self.record(Call::Initialize);
        if self.config.initialize_fails {
            return Err(ApiError::with_status(400, "Project is over its deployment limit"));
        }

        let mut deployment = deployment(self.config.initialize_status);
        deployment.content_hash = request.content_hash.clone();
        if self.config.external_build {
            deployment.external_build_data = Some(ExternalBuildData {
                build_id: "build_1".to_string(),
                build_token: "token_1".to_string(),
                project_id: "depot_1".to_string(),
            });
        }
        if self.config.initialize_status == DeploymentStatus::Deployed {
            deployment.worker = Some(worker());
        }
        *self.status.lock().unwrap() = match self.config.initialize_status {
            DeploymentStatus::Deployed => DeploymentStatus::Deployed,
            _ => self.config.remote_status,
        };
        Ok(deployment)
    }

    async fn get_deployment(&self, _deployment_id: &str) -> ApiResult<Deployment> {
        self.record(Call::GetDeployment);
        if self.config.get_fails {
            return Err(ApiError::connect("connection reset"));
        }

        let mut deployment = deployment(self.status());
        deployment.error_data = self.config.remote_error.clone();
        if self.config.with_worker {
            deployment.worker = Some(worker());
        }
        Ok(deployment)
    }

    async fn finalize_deployment(
        &self,
        deployment_id: &str,
        request: &FinalizeDeploymentRequest,
        _progress: &ProgressSink,
    ) -> ApiResult<FinalizeDeploymentResponse> {
        self.record(Call::Finalize(request.clone()));
        if self.config.finalize_fails {
            return Err(ApiError::new("Worker failed to start"));
        }
        *self.status.lock().unwrap() = DeploymentStatus::Deployed;
        Ok(FinalizeDeploymentResponse {
            id: deployment_id.to_string(),
        })
    }

    async fn fail_deployment(
        &self,
        deployment_id: &str,
        request: &FailDeploymentRequest,
    ) -> ApiResult<FailDeploymentResponse> {
        self.record(Call::Fail(request.clone()));
        *self.status.lock().unwrap() = DeploymentStatus::Failed;
        Ok(FailDeploymentResponse {
            id: deployment_id.to_string(),
        })
    }

    async fn import_env_vars(
        &self,
        _project_ref: &str,
        _environment_slug: &str,
        request: &ImportEnvVarsRequest,
    ) -> ApiResult<ImportEnvVarsResponse> {
        self.record(Call::ImportEnvVars(request.clone()));
        Ok(ImportEnvVarsResponse {
            success: self.config.import_succeeds,
        })
    }
}

/// Account-scoped half of the fake control plane
pub struct FakeAccount {
    pub plane: Arc<FakeControlPlane>,
}

#[async_trait]
impl AccountApi for FakeAccount {
    async fn whoami(&self) -> ApiResult<WhoAmIResponse> {
        Ok(WhoAmIResponse {
            user_id: "user_1".to_string(),
            email: None,
            dashboard_url: DASHBOARD_URL.to_string(),
        })
    }

    async fn upsert_branch(
        &self,
        _project_ref: &str,
        request: &UpsertBranchRequest,
    ) -> ApiResult<UpsertBranchResponse> {
        self.plane.record(Call::UpsertBranch(request.branch.clone()));
        Ok(UpsertBranchResponse {
            branch: self.plane.config.upsert_returns_branch.then(|| BranchEnvironment {
                id: "env_preview_1".to_string(),
                slug: "preview".to_string(),
                branch_name: Some(request.branch.clone()),
            }),
        })
    }

    async fn archive_branch(
        &self,
        _project_ref: &str,
        branch: &str,
    ) -> ApiResult<ArchiveBranchResponse> {
        self.plane.record(Call::ArchiveBranch(branch.to_string()));
        Ok(ArchiveBranchResponse {
            archived: self.plane.config.archived,
        })
    }

    async fn connect_project(
        &self,
        _project_ref: &str,
        env_slug: &str,
        branch: Option<&str>,
    ) -> ApiResult<ProjectClient> {
        self.plane.record(Call::ConnectProject {
            env: env_slug.to_string(),
            branch: branch.map(str::to_string),
        });
        Ok(ProjectClient {
            id: "project_1".to_string(),
            api_url: "https://api.taskship.test".to_string(),
            api: self.plane.clone(),
        })
    }
}

pub struct FakeAuthenticator {
    pub plane: Arc<FakeControlPlane>,
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn authenticate(&self) -> Result<AuthContext, DeployError> {
        self.plane.record(Call::Authenticate);
        Ok(AuthContext {
            user_id: "user_1".to_string(),
            api_url: "https://api.taskship.test".to_string(),
            dashboard_url: DASHBOARD_URL.to_string(),
            account: Arc::new(FakeAccount {
                plane: self.plane.clone(),
            }),
        })
    }
}

pub struct FakeVcs {
    pub meta: GitMeta,
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn git_meta(&self, _dir: &Path) -> GitMeta {
        self.meta.clone()
    }
}

pub struct FakeBundler {
    pub manifest: Result<BuildManifest, String>,
    pub requests: Mutex<Vec<BundleRequest>>,
}

impl FakeBundler {
    pub fn new(manifest: BuildManifest) -> Arc<Self> {
        Arc::new(Self {
            manifest: Ok(manifest),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            manifest: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Bundler for FakeBundler {
    async fn bundle(
        &self,
        request: &BundleRequest,
        _progress: &ProgressSink,
    ) -> Result<BuildManifest, DeployError> {
        self.requests.lock().unwrap().push(request.clone());
        self.manifest.clone().map_err(DeployError::Build)
    }
}

pub struct FakeImageBuilder {
    pub toolchain_installed: bool,
    pub result: BuildResult,
    pub probes: Mutex<usize>,
    pub builds: Mutex<Vec<ImageBuildRequest>>,
}

impl FakeImageBuilder {
    pub fn new(result: BuildResult) -> Arc<Self> {
        Arc::new(Self {
            toolchain_installed: true,
            result,
            probes: Mutex::new(0),
            builds: Mutex::new(Vec::new()),
        })
    }

    pub fn without_toolchain() -> Arc<Self> {
        Arc::new(Self {
            toolchain_installed: false,
            result: build_ok(),
            probes: Mutex::new(0),
            builds: Mutex::new(Vec::new()),
        })
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageBuilder for FakeImageBuilder {
    async fn probe_toolchain(&self) -> Result<(), DeployError> {
        *self.probes.lock().unwrap() += 1;
        if self.toolchain_installed {
            Ok(())
        } else {
            Err(DeployError::MissingToolchain {
                tool: "docker buildx".to_string(),
                install_url: "https://github.com/docker/buildx#installing".to_string(),
            })
        }
    }

    async fn build(&self, request: &ImageBuildRequest, _progress: &ProgressSink) -> BuildResult {
        self.builds.lock().unwrap().push(request.clone());
        self.result.clone()
    }
}

pub fn manifest() -> BuildManifest {
    serde_json::from_value(serde_json::json!({
        "contentHash": "hash_1",
        "build": { "env": { "NODE_ENV": "production" } }
    }))
    .unwrap()
}

pub fn manifest_with_sync() -> BuildManifest {
    let mut manifest = manifest();
    manifest.deploy.sync = Some(SyncPayload {
        env: BTreeMap::from([("API_KEY".to_string(), "secret".to_string())]),
        parent_env: BTreeMap::new(),
    });
    manifest
}

pub fn build_ok() -> BuildResult {
    BuildResult {
        ok: true,
        image: format!("registry.taskship.dev/{}:20261016.1", PROJECT_REF),
        digest: Some(format!("sha256:{}", "a".repeat(64))),
        logs: "#1 [internal] load build definition\n#8 DONE 2.1s\n".to_string(),
        error: None,
    }
}

/// A project directory and an isolated CLI home
pub struct Workspace {
    pub project: TempDir,
    pub home: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let project = tempfile::tempdir().unwrap();
        std::fs::write(
            project.path().join("taskship.json"),
            format!(r#"{{"project": "{}", "dirs": ["src/tasks"]}}"#, PROJECT_REF),
        )
        .unwrap();

        Self {
            project,
            home: tempfile::tempdir().unwrap(),
        }
    }

    pub fn request(&self, env: TargetEnv) -> DeployRequest {
        DeployRequest::new(self.project.path(), env)
    }
}

/// Fakes wired into a session whose output is captured
pub struct Harness {
    pub plane: Arc<FakeControlPlane>,
    pub bundler: Arc<FakeBundler>,
    pub image_builder: Arc<FakeImageBuilder>,
    pub reporter: Reporter,
    pub session: Session,
}

impl Harness {
    pub fn new(
        workspace: &Workspace,
        config: PlaneConfig,
        meta: GitMeta,
        bundler: Arc<FakeBundler>,
        image_builder: Arc<FakeImageBuilder>,
    ) -> Self {
        let plane = FakeControlPlane::new(config);
        let reporter = Reporter::capturing();
        let session = Session::new(
            Arc::new(FakeAuthenticator {
                plane: plane.clone(),
            }),
            Arc::new(FakeVcs { meta }),
            bundler.clone(),
            image_builder.clone(),
        )
        .with_layout(StorageLayout::new(workspace.home.path()))
        .with_reporter(reporter.clone());

        Self {
            plane,
            bundler,
            image_builder,
            reporter,
            session,
        }
    }

    /// Default fakes: a clean manifest and a clean image build
    pub fn standard(workspace: &Workspace, config: PlaneConfig) -> Self {
        Self::new(
            workspace,
            config,
            GitMeta::default(),
            FakeBundler::new(manifest()),
            FakeImageBuilder::new(build_ok()),
        )
    }
}
