//! Preview branch management

use openapi_client::models::{BranchEnvironment, UpsertBranchRequest};
use tracing::{info, warn};

use crate::app::options::{DeployRequest, TargetEnv};
use crate::deploy::git::branch_name;
use crate::errors::DeployError;
use crate::http::api::AccountApi;
use crate::models::deployment::GitMeta;

/// Branch for a run: the explicit one, else the checkout's.
///
/// Only preview deploys need a branch; for them a missing one is a
/// validation error. Other environments ignore the branch entirely.
pub fn resolve_branch(
    request: &DeployRequest,
    git_meta: &GitMeta,
) -> Result<Option<String>, DeployError> {
    if request.env != TargetEnv::Preview {
        return Ok(None);
    }

    request
        .branch
        .as_deref()
        .or(git_meta.branch_name.as_deref())
        .map(|b| branch_name(b.trim()).to_string())
        .filter(|b| !b.is_empty())
        .map(Some)
        .ok_or_else(|| {
            DeployError::Validation(
                "Didn't auto-detect preview branch, so you need to specify one. Pass --branch <branch>."
                    .to_string(),
            )
        })
}

/// Archive the preview branch when its pull request is finished.
///
/// Returns `None` when the pull request is still open (or unknown), and
/// `Some(archived)` when an archive was attempted.
pub async fn archive_if_closed(
    api: &dyn AccountApi,
    project_ref: &str,
    branch: &str,
    git_meta: &GitMeta,
) -> Option<bool> {
    let state = git_meta.pull_request_state.filter(|s| s.is_finished())?;
    info!(branch, state = ?state, "Pull request finished, archiving preview branch");

    match api.archive_branch(project_ref, branch).await {
        Ok(response) => Some(response.archived),
        Err(e) => {
            warn!(branch, "Failed to archive preview branch: {}", e);
            Some(false)
        }
    }
}

/// Create or fetch the preview environment for `branch`
pub async fn upsert_branch(
    api: &dyn AccountApi,
    project_ref: &str,
    branch: &str,
    git_meta: &GitMeta,
) -> Result<BranchEnvironment, DeployError> {
    let request = UpsertBranchRequest {
        branch: branch.to_string(),
        env: TargetEnv::Preview.slug().to_string(),
        git: Some(git_meta.clone()),
    };

    let failed = || DeployError::Deployment(format!("Failed to create branch \"{}\"", branch));
    match api.upsert_branch(project_ref, &request).await {
        Ok(response) => response.branch.ok_or_else(failed),
        Err(e) => {
            warn!(branch, "Branch upsert failed: {}", e);
            Err(failed())
        }
    }
}
