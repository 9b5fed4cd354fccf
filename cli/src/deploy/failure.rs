//! Failure handling for a run that already created a deployment
//!
//! The remote status decides what gets printed and whether the control plane
//! still needs to be told about the failure.

use openapi_client::models::DeploymentErrorData;
use tracing::{debug, warn};

use crate::deploy::build_logs::{check_logs_for_errors, save_logs};
use crate::deploy::lifecycle::{LifecycleClient, RemoteStatus};
use crate::errors::{DeployError, ErrorKind};
use crate::models::deployment::Deployment;
use crate::reporter::Reporter;
use crate::storage::layout::StorageLayout;

/// A local step failure and the output captured so far
#[derive(Debug, Clone)]
pub struct LocalFailure {
    pub kind: ErrorKind,
    pub error: DeploymentErrorData,
    pub logs: String,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl LocalFailure {
    pub fn new(kind: ErrorKind, name: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            error: DeploymentErrorData {
                name: name.to_string(),
                message: message.into(),
                stack: None,
                stderr: None,
            },
            logs: String::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = logs.into();
        self
    }

    pub fn with_scan(mut self, warnings: Vec<String>, errors: Vec<String>) -> Self {
        self.warnings = warnings;
        self.errors = errors;
        self
    }

    fn has_logs(&self) -> bool {
        !self.logs.trim().is_empty()
    }
}

/// Everything `fail_deploy` prints and writes through
pub struct FailureOutput<'a> {
    pub reporter: &'a Reporter,
    pub layout: &'a StorageLayout,
}

impl FailureOutput<'_> {
    async fn persist(&self, short_code: &str, logs: &str) -> Option<String> {
        match save_logs(self.layout, short_code, logs).await {
            Ok(path) => Some(path.display().to_string()),
            Err(e) => {
                warn!("Failed to save build logs: {}", e);
                None
            }
        }
    }

    /// Save and summarize logs under a status-specific prefix
    async fn output_logs(&self, short_code: &str, failure: &LocalFailure, prefix: &str) {
        let message = failure.error.message.trim_end_matches('.');

        if !failure.has_logs() {
            self.reporter.outro_error(prefix, &format!("{}.", message));
            return;
        }

        let path = self.persist(short_code, &failure.logs).await;
        self.reporter.print_warnings(&failure.warnings);
        self.reporter.print_errors(&failure.errors);
        for hint in check_logs_for_errors(&failure.logs) {
            self.reporter.message(&hint);
        }

        match path {
            Some(path) => self.reporter.outro_error(
                prefix,
                &format!("{}. Full build logs have been saved to {}", message, path),
            ),
            None => self.reporter.outro_error(prefix, &format!("{}.", message)),
        }
    }
}

/// Classify a local failure against the deployment's remote status.
///
/// Always returns an already-reported error for the caller to propagate.
pub async fn fail_deploy(
    lifecycle: &mut LifecycleClient,
    deployment: &Deployment,
    failure: LocalFailure,
    output: &FailureOutput<'_>,
) -> DeployError {
    debug!(id = %deployment.id, name = %failure.error.name, "Failing deployment");
    output.reporter.error("Failed to deploy project");

    let status = match lifecycle.remote_status(&deployment.id).await {
        Ok(status) => status,
        Err(e) => {
            // Status unknown, so nothing is reported to the control plane
            debug!("Failed to get deployment status: {}", e);
            output.output_logs(&deployment.short_code, &failure, "Error").await;
            return DeployError::reported(failure.kind, failure.error.message);
        }
    };

    let message = match status {
        RemoteStatus::InProgress(_) => {
            output.output_logs(&deployment.short_code, &failure, "Error").await;
            if let Err(e) = lifecycle
                .report_failure(&deployment.id, failure.error.clone())
                .await
            {
                warn!("Failed to report deployment failure: {}", e);
            }
            "Failed to deploy project"
        }
        RemoteStatus::Canceled => {
            output.output_logs(&deployment.short_code, &failure, "Canceled").await;
            "Failed to deploy project"
        }
        RemoteStatus::Failed(Some(data)) => {
            output
                .reporter
                .pretty_error(&data.message, data.stack.as_deref(), data.stderr.as_deref());
            let saved = if failure.has_logs() {
                output.persist(&deployment.short_code, &failure.logs).await
            } else {
                None
            };
            match saved {
                Some(path) => output.reporter.outro(&format!(
                    "Aborting deployment. Full build logs have been saved to {}",
                    path
                )),
                None => output.reporter.outro("Aborting deployment"),
            }
            "Failed to deploy project"
        }
        RemoteStatus::Failed(None) => {
            output.output_logs(&deployment.short_code, &failure, "Failed").await;
            "Failed to deploy project"
        }
        RemoteStatus::Deployed => {
            output
                .output_logs(&deployment.short_code, &failure, "Deployed with errors")
                .await;
            "Deployed with errors"
        }
        RemoteStatus::TimedOut => {
            output.output_logs(&deployment.short_code, &failure, "TimedOut").await;
            "Timed out"
        }
    };

    DeployError::reported(failure.kind, message)
}
