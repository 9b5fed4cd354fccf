//! Run a deploy with the real collaborators

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

use crate::app::options::{AppOptions, DeployRequest};
use crate::authn::login::ProfileAuthenticator;
use crate::deploy::bundle::ProcessBundler;
use crate::deploy::docker::DockerImageBuilder;
use crate::deploy::git::GitCli;
use crate::deploy::session::{DeployOutcome, Session, PROJECT_REF_ENV_VAR};
use crate::errors::DeployError;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::reporter::Reporter;

/// Deploy and return the process exit code
pub async fn run(options: AppOptions, request: DeployRequest) -> i32 {
    let reporter = Reporter::new();
    let result = deploy(options, request, reporter.clone()).await;
    exit_code(&result, &reporter)
}

async fn deploy(
    options: AppOptions,
    request: DeployRequest,
    reporter: Reporter,
) -> Result<DeployOutcome, DeployError> {
    let authenticator = ProfileAuthenticator {
        layout: options.layout.clone(),
        profile: options.profile.clone(),
        api_url_override: options.api_url.clone(),
        token_override: std::env::var("TASKSHIP_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(SecretString::from),
    };

    let (progress, rx) = ProgressSink::channel();
    let printer = tokio::spawn(print_progress(rx, reporter.clone()));

    let session = Session::new(
        Arc::new(authenticator),
        Arc::new(GitCli::from_env()),
        Arc::new(ProcessBundler),
        Arc::new(DockerImageBuilder::new()),
    )
    .with_layout(options.layout)
    .with_reporter(reporter)
    .with_progress(progress)
    .with_env_project_ref(std::env::var(PROJECT_REF_ENV_VAR).ok())
    .with_ci_outputs(true);

    info!(env = request.env.slug(), path = %request.project_path.display(), "Starting deploy");
    let result = session.run(&request).await;

    // Closes the progress channel so the printer drains and exits
    drop(session);
    let _ = printer.await;

    result
}

async fn print_progress(mut rx: UnboundedReceiver<ProgressEvent>, reporter: Reporter) {
    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::BundleStarted => debug!("Bundle started"),
            ProgressEvent::BundleCompleted => debug!("Bundle completed"),
            ProgressEvent::BuildLog(line) => {
                if reporter.is_ci() {
                    reporter.message(&line);
                } else {
                    debug!("build: {}", line);
                }
            }
            ProgressEvent::DeployLog(line) => reporter.message(&line),
        }
    }
}

/// Map a run result to a process exit code, printing unreported failures
pub fn exit_code(result: &Result<DeployOutcome, DeployError>, reporter: &Reporter) -> i32 {
    match result {
        Ok(DeployOutcome::Archived {
            archived: false, ..
        }) => 1,
        Ok(_) => 0,
        Err(e) => {
            error!(kind = ?e.kind(), "Deploy failed: {}", e);
            if e.should_print() {
                reporter.outro_error("Error", &e.to_string());
            }
            e.exit_code()
        }
    }
}
