//! Deployment lifecycle client
//!
//! Wraps the environment-scoped [`ProjectApi`] with the rules the local side
//! must follow: a deployment is created once, finalized at most once, and
//! reported failed at most once, and never both finalized and failed.

use std::sync::Arc;

use openapi_client::models::{
    DeploymentErrorData, FailDeploymentRequest, FinalizeDeploymentRequest,
    FinalizeDeploymentResponse, InitializeDeploymentRequest,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::deploy::fsm::StatusTracker;
use crate::http::api::{ApiError, ApiResult, ProjectApi};
use crate::models::deployment::{prepare_deployment_error, Deployment, DeploymentStatus};
use crate::progress::ProgressSink;

/// Why initialize did not produce a usable deployment
#[derive(Debug, Error)]
pub enum InitializeError {
    #[error("{0}")]
    Rejected(#[from] ApiError),

    /// Created, but neither a hosted builder nor a self-hosted build is available
    #[error(
        "Failed to start deployment, as we couldn't create a remote build. This project's environment does not support hosting. To deploy this project, you must use the --self-hosted flag to build and push the image yourself."
    )]
    NoBuildPath(Box<Deployment>),
}

/// Remote status as a tagged variant, refreshed by an explicit fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Pending, building or deploying
    InProgress(DeploymentStatus),
    Canceled,
    /// Failed remotely, with the decoded error payload if it had one
    Failed(Option<DeploymentErrorData>),
    Deployed,
    TimedOut,
}

impl RemoteStatus {
    pub fn from_deployment(deployment: &Deployment) -> Self {
        match deployment.status {
            DeploymentStatus::Pending
            | DeploymentStatus::Building
            | DeploymentStatus::Deploying => RemoteStatus::InProgress(deployment.status),
            DeploymentStatus::Canceled => RemoteStatus::Canceled,
            DeploymentStatus::Failed => RemoteStatus::Failed(
                deployment
                    .error_data
                    .as_ref()
                    .and_then(prepare_deployment_error),
            ),
            DeploymentStatus::Deployed => RemoteStatus::Deployed,
            DeploymentStatus::TimedOut => RemoteStatus::TimedOut,
        }
    }
}

/// Client for one deployment resource per run
pub struct LifecycleClient {
    api: Arc<dyn ProjectApi>,
    tracker: Option<StatusTracker>,
    finalize_attempted: bool,
    finalized: bool,
    failure_reported: bool,
}

impl LifecycleClient {
    pub fn new(api: Arc<dyn ProjectApi>) -> Self {
        Self {
            api,
            tracker: None,
            finalize_attempted: false,
            finalized: false,
            failure_reported: false,
        }
    }

    /// Last status observed for the deployment, if one exists
    pub fn observed_status(&self) -> Option<DeploymentStatus> {
        self.tracker.as_ref().map(StatusTracker::status)
    }

    /// Create the deployment resource for a build.
    ///
    /// A response that is already `DEPLOYED` is returned as is; the caller
    /// decides what to do with an identical rebuild.
    pub async fn initialize(
        &mut self,
        request: &InitializeDeploymentRequest,
    ) -> Result<Deployment, InitializeError> {
        let deployment = self.api.initialize_deployment(request).await?;
        info!(
            id = %deployment.id,
            version = %deployment.version,
            status = ?deployment.status,
            "Deployment initialized"
        );
        self.tracker = Some(StatusTracker::new(deployment.status));

        if deployment.status != DeploymentStatus::Deployed
            && deployment.external_build_data.is_none()
            && !request.self_hosted
        {
            return Err(InitializeError::NoBuildPath(Box::new(deployment)));
        }

        Ok(deployment)
    }

    /// Refresh the local projection of the deployment
    pub async fn fetch(&mut self, deployment_id: &str) -> ApiResult<Deployment> {
        let deployment = self.api.get_deployment(deployment_id).await?;

        match self.tracker.as_mut() {
            Some(tracker) => {
                if let Err(e) = tracker.observe(deployment.status) {
                    warn!(id = %deployment_id, "Ignoring stale deployment status: {}", e);
                }
            }
            None => self.tracker = Some(StatusTracker::new(deployment.status)),
        }

        Ok(deployment)
    }

    /// Fetch the deployment and classify its server-side status
    pub async fn remote_status(&mut self, deployment_id: &str) -> ApiResult<RemoteStatus> {
        let deployment = self.fetch(deployment_id).await?;
        Ok(RemoteStatus::from_deployment(&deployment))
    }

    /// Ask the control plane to move the deployment towards `DEPLOYED`
    pub async fn finalize(
        &mut self,
        deployment_id: &str,
        request: &FinalizeDeploymentRequest,
        progress: &ProgressSink,
    ) -> ApiResult<FinalizeDeploymentResponse> {
        if self.finalize_attempted || self.failure_reported {
            return Err(ApiError::new(format!(
                "Deployment {} was already finalized or failed",
                deployment_id
            )));
        }
        self.finalize_attempted = true;

        let response = self
            .api
            .finalize_deployment(deployment_id, request, progress)
            .await?;
        self.finalized = true;
        debug!(id = %response.id, "Deployment finalized");
        Ok(response)
    }

    /// Tell the control plane a local step failed.
    ///
    /// Sent at most once per run and never after a successful finalize.
    /// Returns whether a report was sent.
    pub async fn report_failure(
        &mut self,
        deployment_id: &str,
        error: DeploymentErrorData,
    ) -> ApiResult<bool> {
        if self.failure_reported || self.finalized {
            debug!(id = %deployment_id, "Skipping duplicate failure report");
            return Ok(false);
        }
        self.failure_reported = true;

        warn!(id = %deployment_id, name = %error.name, "Reporting deployment failure");
        self.api
            .fail_deployment(deployment_id, &FailDeploymentRequest { error })
            .await?;
        Ok(true)
    }
}
