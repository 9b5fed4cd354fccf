//! Account-scoped endpoints

use std::sync::Arc;

use async_trait::async_trait;
use openapi_client::models::{
    ArchiveBranchResponse, ProjectEnvResponse, UpsertBranchRequest, UpsertBranchResponse,
    WhoAmIResponse,
};
use secrecy::SecretString;
use tracing::debug;

use crate::http::api::{AccountApi, ApiResult, ProjectClient};
use crate::http::client::{segment, HttpClient};

#[async_trait]
impl AccountApi for HttpClient {
    async fn whoami(&self) -> ApiResult<WhoAmIResponse> {
        self.get("/api/v2/whoami").await
    }

    async fn upsert_branch(
        &self,
        project_ref: &str,
        request: &UpsertBranchRequest,
    ) -> ApiResult<UpsertBranchResponse> {
        self.post_upsert_branch(project_ref, request).await
    }

    async fn archive_branch(
        &self,
        project_ref: &str,
        branch: &str,
    ) -> ApiResult<ArchiveBranchResponse> {
        self.post_archive_branch(project_ref, branch).await
    }

    async fn connect_project(
        &self,
        project_ref: &str,
        env_slug: &str,
        branch: Option<&str>,
    ) -> ApiResult<ProjectClient> {
        let path = format!(
            "/api/v1/projects/{}/{}",
            segment(project_ref),
            segment(env_slug)
        );
        let env: ProjectEnvResponse = self.get(&path).await?;
        debug!(project_id = %env.project_id, api_url = %env.api_url, "Resolved project environment");

        let client = HttpClient::new(&env.api_url, SecretString::from(env.api_key))?
            .with_branch(branch.map(str::to_string));

        Ok(ProjectClient {
            id: env.project_id,
            api_url: client.base_url().to_string(),
            api: Arc::new(client),
        })
    }
}
