//! Environment variable endpoints

use openapi_client::models::{
    EnvironmentVariablesResponse, ImportEnvVarsRequest, ImportEnvVarsResponse,
};

use crate::http::api::ApiResult;
use crate::http::client::{segment, HttpClient};

impl HttpClient {
    /// Variables already stored for the client's environment
    pub async fn fetch_env_vars(&self, project_ref: &str) -> ApiResult<EnvironmentVariablesResponse> {
        let path = format!("/api/v1/projects/{}/envvars", segment(project_ref));
        self.get(&path).await
    }

    /// Replace the variable set of `environment_slug`
    pub async fn push_env_vars(
        &self,
        project_ref: &str,
        environment_slug: &str,
        request: &ImportEnvVarsRequest,
    ) -> ApiResult<ImportEnvVarsResponse> {
        let path = format!(
            "/api/v1/projects/{}/envvars/{}/import",
            segment(project_ref),
            segment(environment_slug)
        );
        self.post(&path, request).await
    }
}
