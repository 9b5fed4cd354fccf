//! Control-plane API seams
//!
//! Every remote call returns an [`ApiResult`]; transport failures, non-2xx
//! responses and undecodable bodies all surface as [`ApiError`] values.

use std::sync::Arc;

use async_trait::async_trait;
use openapi_client::models::{
    ArchiveBranchResponse, Deployment, EnvironmentVariablesResponse, ExternalsResponse,
    FailDeploymentRequest, FailDeploymentResponse, FinalizeDeploymentRequest,
    FinalizeDeploymentResponse, ImportEnvVarsRequest, ImportEnvVarsResponse,
    InitializeDeploymentRequest, UpsertBranchRequest, UpsertBranchResponse, WhoAmIResponse,
};
use thiserror::Error;

use crate::progress::ProgressSink;

/// Failure of a single control-plane call
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// The server could not be reached at all
    pub connect: bool,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            connect: false,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            connect: false,
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            connect: true,
        }
    }

    /// Worth retrying for idempotent requests
    pub fn is_transient(&self) -> bool {
        self.connect || self.status.map(|s| s >= 500).unwrap_or(false)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ApiError::connect(err.to_string())
        } else {
            ApiError {
                message: err.to_string(),
                status: err.status().map(|s| s.as_u16()),
                connect: false,
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Project client scoped to one environment
#[derive(Clone)]
pub struct ProjectClient {
    /// Internal project id
    pub id: String,
    pub api_url: String,
    pub api: Arc<dyn ProjectApi>,
}

impl std::fmt::Debug for ProjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectClient")
            .field("id", &self.id)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// Calls authorized by the user's personal access token
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Resolve the caller's identity and dashboard location
    async fn whoami(&self) -> ApiResult<WhoAmIResponse>;

    /// Create or fetch the preview environment for a branch
    async fn upsert_branch(
        &self,
        project_ref: &str,
        request: &UpsertBranchRequest,
    ) -> ApiResult<UpsertBranchResponse>;

    /// Archive the preview environment for a branch
    async fn archive_branch(
        &self,
        project_ref: &str,
        branch: &str,
    ) -> ApiResult<ArchiveBranchResponse>;

    /// Exchange the access token for an environment-scoped client
    async fn connect_project(
        &self,
        project_ref: &str,
        env_slug: &str,
        branch: Option<&str>,
    ) -> ApiResult<ProjectClient>;
}

/// Calls authorized by an environment API key
#[async_trait]
pub trait ProjectApi: Send + Sync {
    async fn get_environment_variables(
        &self,
        project_ref: &str,
    ) -> ApiResult<EnvironmentVariablesResponse>;

    /// Packages the bundler must leave external
    async fn forced_externals(&self) -> ApiResult<ExternalsResponse>;

    async fn initialize_deployment(
        &self,
        request: &InitializeDeploymentRequest,
    ) -> ApiResult<Deployment>;

    async fn get_deployment(&self, deployment_id: &str) -> ApiResult<Deployment>;

    /// Ask the control plane to finalize; server progress lines go to `progress`
    async fn finalize_deployment(
        &self,
        deployment_id: &str,
        request: &FinalizeDeploymentRequest,
        progress: &ProgressSink,
    ) -> ApiResult<FinalizeDeploymentResponse>;

    async fn fail_deployment(
        &self,
        deployment_id: &str,
        request: &FailDeploymentRequest,
    ) -> ApiResult<FailDeploymentResponse>;

    /// Overwrite the variables of one environment
    async fn import_env_vars(
        &self,
        project_ref: &str,
        environment_slug: &str,
        request: &ImportEnvVarsRequest,
    ) -> ApiResult<ImportEnvVarsResponse>;
}
