//! Build coordination: bundle, then image

use std::sync::Arc;

use tracing::{info, warn};

use crate::deploy::build_logs::{check_logs_for_warnings, LogScan};
use crate::deploy::bundle::{BundleRequest, Bundler};
use crate::deploy::docker::{BuildResult, ImageBuildRequest, ImageBuilder};
use crate::errors::DeployError;
use crate::models::manifest::BuildManifest;
use crate::progress::ProgressSink;

/// Image step outcome after log scanning
#[derive(Debug, Clone)]
pub enum ImageOutcome {
    Built { result: BuildResult, scan: LogScan },
    /// An error marker was found in the logs, whatever the exit status
    LogErrors { result: BuildResult, scan: LogScan },
    /// The builder itself reported failure and the logs show no known error
    Failed { result: BuildResult, scan: LogScan },
}

impl ImageOutcome {
    /// Classify a builder result. Log errors win over a clean exit.
    pub fn classify(result: BuildResult) -> Self {
        let scan = check_logs_for_warnings(&result.logs);

        if !scan.ok {
            ImageOutcome::LogErrors { result, scan }
        } else if !result.ok {
            ImageOutcome::Failed { result, scan }
        } else {
            ImageOutcome::Built { result, scan }
        }
    }
}

pub struct BuildCoordinator {
    bundler: Arc<dyn Bundler>,
    image_builder: Arc<dyn ImageBuilder>,
    progress: ProgressSink,
}

impl BuildCoordinator {
    pub fn new(
        bundler: Arc<dyn Bundler>,
        image_builder: Arc<dyn ImageBuilder>,
        progress: ProgressSink,
    ) -> Self {
        Self {
            bundler,
            image_builder,
            progress,
        }
    }

    /// Produce the build manifest. Any failure is a build error.
    pub async fn bundle(&self, request: &BundleRequest) -> Result<BuildManifest, DeployError> {
        let manifest = self
            .bundler
            .bundle(request, &self.progress)
            .await
            .map_err(|e| match e {
                DeployError::Build(_) => e,
                other => DeployError::Build(other.to_string()),
            })?;

        info!(content_hash = %manifest.content_hash, "Bundle complete");
        Ok(manifest)
    }

    /// Self-hosted builds need a local toolchain
    pub async fn ensure_toolchain(&self, self_hosted: bool) -> Result<(), DeployError> {
        if !self_hosted {
            return Ok(());
        }
        self.image_builder.probe_toolchain().await
    }

    pub async fn build_image(&self, request: &ImageBuildRequest) -> ImageOutcome {
        let result = self.image_builder.build(request, &self.progress).await;
        let outcome = ImageOutcome::classify(result);

        match &outcome {
            ImageOutcome::Built { result, scan } => {
                info!(image = %result.image, digest = ?result.digest, warnings = scan.warnings.len(), "Image built");
            }
            ImageOutcome::LogErrors { scan, .. } => {
                warn!(errors = scan.errors.len(), "Image build logs contain errors");
            }
            ImageOutcome::Failed { result, .. } => {
                warn!(error = ?result.error, "Image build failed");
            }
        }

        outcome
    }
}
