//! Preview branch endpoints

use openapi_client::models::{
    ArchiveBranchRequest, ArchiveBranchResponse, UpsertBranchRequest, UpsertBranchResponse,
};

use crate::http::api::ApiResult;
use crate::http::client::{segment, HttpClient};

impl HttpClient {
    pub async fn post_upsert_branch(
        &self,
        project_ref: &str,
        request: &UpsertBranchRequest,
    ) -> ApiResult<UpsertBranchResponse> {
        let path = format!("/api/v1/projects/{}/branches", segment(project_ref));
        self.post(&path, request).await
    }

    pub async fn post_archive_branch(
        &self,
        project_ref: &str,
        branch: &str,
    ) -> ApiResult<ArchiveBranchResponse> {
        let path = format!("/api/v1/projects/{}/branches/archive", segment(project_ref));
        let request = ArchiveBranchRequest {
            branch: branch.to_string(),
        };
        self.post(&path, &request).await
    }
}
