mod common;

use common::*;
use openapi_client::models::{DeploymentStatus, GitMeta};
use taskship::app::options::TargetEnv;
use taskship::deploy::docker::BuildResult;
use taskship::errors::{DeployError, ErrorKind};

fn build_with_logs(ok: bool, logs: &str, error: Option<&str>) -> BuildResult {
    BuildResult {
        ok,
        logs: logs.to_string(),
        error: error.map(str::to_string),
        ..build_ok()
    }
}

const FAILING_LOGS: &str = "#7 [build 3/4] RUN npm ci\nnpm ERR! code ERESOLVE\n#7 ERROR: process exited\n";

const WARNING_LOGS: &str = "#6 [build 2/4] RUN npm ci\nnpm WARN deprecated inflight@1.0.6\n#6 DONE 4.2s\n";

fn printed_warning(harness: &Harness) -> bool {
    harness
        .reporter
        .captured()
        .iter()
        .any(|line| line.contains("npm WARN deprecated inflight@1.0.6"))
}

async fn run_failing_build(config: PlaneConfig, result: BuildResult) -> (Harness, DeployError) {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        config,
        GitMeta::default(),
        FakeBundler::new(manifest()),
        FakeImageBuilder::new(result),
    );
    let err = harness
        .session
        .run(&workspace.request(TargetEnv::Prod))
        .await
        .unwrap_err();
    (harness, err)
}

#[tokio::test]
async fn test_log_errors_fail_a_clean_exit() {
    let (harness, err) = run_failing_build(
        PlaneConfig::default(),
        build_with_logs(true, FAILING_LOGS, None),
    )
    .await;

    assert_eq!(err.kind(), ErrorKind::Build);
    assert!(!err.should_print());
    assert_eq!(err.to_string(), "Failed to deploy project");

    let fails = harness.plane.fail_requests();
    assert_eq!(fails.len(), 1);
    assert_eq!(fails[0].error.name, "BuildError");
    assert_eq!(fails[0].error.message, "Build failed: npm ERR! code ERESOLVE");
    assert_eq!(harness.plane.count(|c| matches!(c, Call::Finalize(_))), 0);
    assert_eq!(harness.plane.status(), DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_builder_exit_failure_uses_builder_error() {
    let (harness, err) = run_failing_build(
        PlaneConfig::default(),
        build_with_logs(false, "#5 DONE 0.3s\n", Some("Build exited with exit status: 1")),
    )
    .await;

    assert_eq!(err.kind(), ErrorKind::Build);
    let fails = harness.plane.fail_requests();
    assert_eq!(fails.len(), 1);
    assert_eq!(fails[0].error.message, "Build exited with exit status: 1");
}

#[tokio::test]
async fn test_failed_build_logs_are_saved() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        PlaneConfig::default(),
        GitMeta::default(),
        FakeBundler::new(manifest()),
        FakeImageBuilder::new(build_with_logs(true, FAILING_LOGS, None)),
    );

    harness
        .session
        .run(&workspace.request(TargetEnv::Prod))
        .await
        .unwrap_err();

    let saved: Vec<_> = std::fs::read_dir(workspace.home.path().join("build-logs"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].starts_with("k2x9q-"));
    assert!(saved[0].ends_with(".log"));
}

#[tokio::test]
async fn test_sync_failure_is_reported() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        PlaneConfig {
            import_succeeds: false,
            ..Default::default()
        },
        GitMeta::default(),
        FakeBundler::new(manifest_with_sync()),
        FakeImageBuilder::new(build_ok()),
    );

    let err = harness
        .session
        .run(&workspace.request(TargetEnv::Prod))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Sync);
    let fails = harness.plane.fail_requests();
    assert_eq!(fails.len(), 1);
    assert_eq!(fails[0].error.name, "SyncEnvVarsError");
    assert_eq!(
        fails[0].error.message,
        "Failed to sync 1 env var with the server"
    );
    assert_eq!(harness.image_builder.build_count(), 0);
}

#[tokio::test]
async fn test_self_hosted_without_toolchain() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        PlaneConfig::default(),
        GitMeta::default(),
        FakeBundler::new(manifest()),
        FakeImageBuilder::without_toolchain(),
    );
    let mut request = workspace.request(TargetEnv::Prod);
    request.self_hosted = true;

    let err = harness.session.run(&request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Build);
    let fails = harness.plane.fail_requests();
    assert_eq!(fails.len(), 1);
    assert!(fails[0].error.message.contains("docker buildx"));
    assert_eq!(harness.image_builder.build_count(), 0);
}

#[tokio::test]
async fn test_remote_build_needs_external_build_data() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            external_build: false,
            ..Default::default()
        },
        build_ok(),
    )
    .await;

    assert_eq!(err.kind(), ErrorKind::Deployment);
    let fails = harness.plane.fail_requests();
    assert_eq!(fails.len(), 1);
    assert_eq!(
        fails[0].error.message,
        "Failed to start deployment, as we couldn't create a remote build. This project's environment does not support hosting. To deploy this project, you must use the --self-hosted flag to build and push the image yourself."
    );
    assert_eq!(harness.image_builder.build_count(), 0);
}

#[tokio::test]
async fn test_missing_worker_fails_with_remote_error() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            with_worker: false,
            remote_error: Some(serde_json::json!({
                "name": "IndexError",
                "message": "Could not index tasks"
            })),
            ..Default::default()
        },
        build_ok(),
    )
    .await;

    assert_eq!(err.kind(), ErrorKind::Deployment);
    let fails = harness.plane.fail_requests();
    assert_eq!(fails.len(), 1);
    assert_eq!(fails[0].error.message, "Could not index tasks");
    assert_eq!(harness.plane.count(|c| matches!(c, Call::Finalize(_))), 0);
}

#[tokio::test]
async fn test_missing_worker_failure_prints_scan_warnings() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            with_worker: false,
            ..Default::default()
        },
        build_with_logs(true, WARNING_LOGS, None),
    )
    .await;

    assert_eq!(err.kind(), ErrorKind::Deployment);
    assert_eq!(harness.plane.fail_requests().len(), 1);
    assert!(printed_warning(&harness));
}

#[tokio::test]
async fn test_finalize_failure_prints_scan_warnings() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            finalize_fails: true,
            ..Default::default()
        },
        build_with_logs(true, WARNING_LOGS, None),
    )
    .await;

    assert_eq!(err.kind(), ErrorKind::Deployment);
    assert_eq!(harness.plane.fail_requests()[0].error.name, "FinalizeError");
    assert!(printed_warning(&harness));
}

#[tokio::test]
async fn test_finalize_failure_is_reported() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            finalize_fails: true,
            ..Default::default()
        },
        build_ok(),
    )
    .await;

    assert_eq!(err.kind(), ErrorKind::Deployment);
    let fails = harness.plane.fail_requests();
    assert_eq!(fails.len(), 1);
    assert_eq!(fails[0].error.name, "FinalizeError");
    assert_eq!(fails[0].error.message, "Worker failed to start");
}

#[tokio::test]
async fn test_canceled_deployment_is_not_reported() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            remote_status: DeploymentStatus::Canceled,
            ..Default::default()
        },
        build_with_logs(true, FAILING_LOGS, None),
    )
    .await;

    assert_eq!(err.to_string(), "Failed to deploy project");
    assert!(!err.should_print());
    assert!(harness.plane.fail_requests().is_empty());
}

#[tokio::test]
async fn test_timed_out_deployment() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            remote_status: DeploymentStatus::TimedOut,
            ..Default::default()
        },
        build_with_logs(true, FAILING_LOGS, None),
    )
    .await;

    assert_eq!(err.to_string(), "Timed out");
    assert_eq!(err.exit_code(), 1);
    assert!(harness.plane.fail_requests().is_empty());
}

#[tokio::test]
async fn test_deployed_despite_local_errors() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            remote_status: DeploymentStatus::Deployed,
            ..Default::default()
        },
        build_with_logs(true, FAILING_LOGS, None),
    )
    .await;

    assert_eq!(err.to_string(), "Deployed with errors");
    assert!(harness.plane.fail_requests().is_empty());
}

#[tokio::test]
async fn test_remote_failure_with_error_data_is_not_reported_again() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            remote_status: DeploymentStatus::Failed,
            remote_error: Some(serde_json::json!({
                "name": "Error",
                "message": "Image pull failed",
                "stack": "Error: Image pull failed\n    at pull"
            })),
            ..Default::default()
        },
        build_with_logs(true, FAILING_LOGS, None),
    )
    .await;

    assert_eq!(err.to_string(), "Failed to deploy project");
    assert!(harness.plane.fail_requests().is_empty());
}

#[tokio::test]
async fn test_unreachable_status_skips_report() {
    let (harness, err) = run_failing_build(
        PlaneConfig {
            get_fails: true,
            ..Default::default()
        },
        build_with_logs(true, FAILING_LOGS, None),
    )
    .await;

    assert_eq!(err.kind(), ErrorKind::Build);
    assert_eq!(err.to_string(), "Build failed: npm ERR! code ERESOLVE");
    assert!(!err.should_print());
    assert!(harness.plane.fail_requests().is_empty());
}
