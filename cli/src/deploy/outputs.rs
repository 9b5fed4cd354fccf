//! CI integration outputs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::deploy::session::DeploySummary;
use crate::errors::DeployError;
use crate::filesys::file::File;

/// Values exported to CI after a successful deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiOutputs {
    /// Environment assignments for later steps
    pub env_vars: Vec<(String, String)>,
    /// Structured step outputs
    pub outputs: Vec<(String, String)>,
}

impl CiOutputs {
    pub fn from_summary(summary: &DeploySummary) -> Self {
        let pair = |k: &str, v: &str| (k.to_string(), v.to_string());

        Self {
            env_vars: vec![
                pair("TASKSHIP_DEPLOYMENT_VERSION", &summary.version),
                pair("TASKSHIP_VERSION", &summary.version),
                pair("TASKSHIP_DEPLOYMENT_SHORT_CODE", &summary.short_code),
                pair("TASKSHIP_DEPLOYMENT_URL", &summary.deployment_url),
                pair("TASKSHIP_TEST_URL", &summary.test_url),
            ],
            outputs: vec![
                pair("deploymentVersion", &summary.version),
                pair("workerVersion", &summary.version),
                pair("deploymentShortCode", &summary.short_code),
                pair("deploymentUrl", &summary.deployment_url),
                pair("testUrl", &summary.test_url),
                pair(
                    "needsPromotion",
                    if summary.needs_promotion { "true" } else { "false" },
                ),
            ],
        }
    }

    /// Append to the files named by `GITHUB_ENV` and `GITHUB_OUTPUT`, if set
    pub async fn write_from_env(&self) -> Result<(), DeployError> {
        let path = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        self.write(path("GITHUB_ENV").as_deref(), path("GITHUB_OUTPUT").as_deref())
            .await
    }

    pub async fn write(
        &self,
        github_env: Option<&Path>,
        github_output: Option<&Path>,
    ) -> Result<(), DeployError> {
        let lines = |pairs: &[(String, String)]| {
            pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
        };

        for line in lines(&self.env_vars).iter().chain(lines(&self.outputs).iter()) {
            debug!("{}", line);
        }

        if let Some(path) = github_env {
            File::new(path).append_lines(&lines(&self.env_vars)).await?;
        }
        if let Some(path) = github_output {
            File::new(path).append_lines(&lines(&self.outputs)).await?;
        }
        Ok(())
    }
}
