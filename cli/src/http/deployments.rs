//! Deployment API client

use async_trait::async_trait;
use openapi_client::models::{
    Deployment, EnvironmentVariablesResponse, ExternalsResponse, FailDeploymentRequest,
    FailDeploymentResponse, FinalizeDeploymentRequest, FinalizeDeploymentResponse, FinalizeEvent,
    ImportEnvVarsRequest, ImportEnvVarsResponse, InitializeDeploymentRequest,
};
use tracing::debug;

use crate::http::api::{ApiError, ApiResult, ProjectApi};
use crate::http::client::{segment, HttpClient};
use crate::progress::{ProgressEvent, ProgressSink};

#[async_trait]
impl ProjectApi for HttpClient {
    async fn get_environment_variables(
        &self,
        project_ref: &str,
    ) -> ApiResult<EnvironmentVariablesResponse> {
        self.fetch_env_vars(project_ref).await
    }

    async fn forced_externals(&self) -> ApiResult<ExternalsResponse> {
        self.get("/api/v1/deployments/externals").await
    }

    async fn initialize_deployment(
        &self,
        request: &InitializeDeploymentRequest,
    ) -> ApiResult<Deployment> {
        self.post("/api/v1/deployments", request).await
    }

    async fn get_deployment(&self, deployment_id: &str) -> ApiResult<Deployment> {
        let path = format!("/api/v1/deployments/{}", segment(deployment_id));
        self.get(&path).await
    }

    async fn finalize_deployment(
        &self,
        deployment_id: &str,
        request: &FinalizeDeploymentRequest,
        progress: &ProgressSink,
    ) -> ApiResult<FinalizeDeploymentResponse> {
        let path = format!("/api/v2/deployments/{}/finalize", segment(deployment_id));
        let mut completed: Option<String> = None;

        self.post_lines(&path, request, |line| {
            let event: FinalizeEvent = serde_json::from_str(line)
                .map_err(|e| ApiError::new(format!("Invalid finalize event: {}", e)))?;
            match event {
                FinalizeEvent::Log { message } => {
                    debug!("finalize: {}", message);
                    progress.emit(ProgressEvent::DeployLog(message));
                    Ok(())
                }
                FinalizeEvent::Complete { id } => {
                    completed = Some(id);
                    Ok(())
                }
                FinalizeEvent::Error { error } => Err(ApiError::new(error)),
            }
        })
        .await?;

        completed
            .map(|id| FinalizeDeploymentResponse { id })
            .ok_or_else(|| ApiError::new("Finalize stream ended before completion"))
    }

    async fn fail_deployment(
        &self,
        deployment_id: &str,
        request: &FailDeploymentRequest,
    ) -> ApiResult<FailDeploymentResponse> {
        let path = format!("/api/v1/deployments/{}/fail", segment(deployment_id));
        self.post(&path, request).await
    }

    async fn import_env_vars(
        &self,
        project_ref: &str,
        environment_slug: &str,
        request: &ImportEnvVarsRequest,
    ) -> ApiResult<ImportEnvVarsResponse> {
        self.push_env_vars(project_ref, environment_slug, request)
            .await
    }
}
