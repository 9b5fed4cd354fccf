mod common;

use common::*;
use openapi_client::models::{DeploymentStatus, GitMeta, PullRequestState};
use taskship::app::options::TargetEnv;
use taskship::deploy::session::DeployOutcome;
use taskship::errors::ErrorKind;

fn preview_meta(branch: &str) -> GitMeta {
    GitMeta {
        branch_name: Some(branch.to_string()),
        commit_sha: Some("4f2a9c1".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_successful_deploy() {
    let workspace = Workspace::new();
    let harness = Harness::standard(&workspace, PlaneConfig::default());

    let outcome = harness
        .session
        .run(&workspace.request(TargetEnv::Prod))
        .await
        .unwrap();

    let DeployOutcome::Deployed(summary) = outcome else {
        panic!("expected a deployed outcome, got {:?}", outcome);
    };
    assert_eq!(summary.version, "20261016.1");
    assert_eq!(summary.task_count, 2);
    assert_eq!(
        summary.deployment_url,
        format!("{}/projects/v3/{}/deployments/k2x9q", DASHBOARD_URL, PROJECT_REF)
    );
    assert_eq!(
        summary.test_url,
        format!("{}/projects/v3/{}/test?environment=prod", DASHBOARD_URL, PROJECT_REF)
    );

    let plane = &harness.plane;
    assert_eq!(plane.count(|c| matches!(c, Call::Initialize)), 1);
    assert_eq!(plane.count(|c| matches!(c, Call::Finalize(_))), 1);
    assert!(plane.fail_requests().is_empty());
    assert_eq!(plane.status(), DeploymentStatus::Deployed);
    assert_eq!(harness.bundler.calls(), 1);
    assert_eq!(harness.image_builder.build_count(), 1);
}

#[tokio::test]
async fn test_finalize_uses_image_and_digest() {
    let workspace = Workspace::new();
    let harness = Harness::standard(&workspace, PlaneConfig::default());

    harness
        .session
        .run(&workspace.request(TargetEnv::Staging))
        .await
        .unwrap();

    let finalize = harness
        .plane
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::Finalize(request) => Some(request),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        finalize.image_reference,
        format!(
            "registry.taskship.dev/{}:20261016.1@sha256:{}",
            PROJECT_REF,
            "a".repeat(64)
        )
    );
    assert!(!finalize.self_hosted);
    assert!(!finalize.skip_promotion);
}

#[tokio::test]
async fn test_bundle_request_carries_externals_and_env() {
    let workspace = Workspace::new();
    let harness = Harness::standard(&workspace, PlaneConfig::default());

    harness
        .session
        .run(&workspace.request(TargetEnv::Prod))
        .await
        .unwrap();

    let requests = harness.bundler.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.project_ref, PROJECT_REF);
    assert_eq!(request.env_slug, "prod");
    assert_eq!(request.branch, None);
    assert!(request.externals.contains(&"sharp".to_string()));
    assert_eq!(
        request.server_env_vars.get("DATABASE_URL").map(String::as_str),
        Some("postgres://db")
    );
}

#[tokio::test]
async fn test_preview_without_branch_fails_before_any_call() {
    let workspace = Workspace::new();
    let harness = Harness::standard(&workspace, PlaneConfig::default());

    let err = harness
        .session
        .run(&workspace.request(TargetEnv::Preview))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.exit_code(), 2);
    assert!(harness.plane.calls().is_empty());
    assert_eq!(harness.bundler.calls(), 0);
}

#[tokio::test]
async fn test_preview_deploy_upserts_branch() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        PlaneConfig::default(),
        preview_meta("refs/heads/feature/login"),
        FakeBundler::new(manifest()),
        FakeImageBuilder::new(build_ok()),
    );

    let outcome = harness
        .session
        .run(&workspace.request(TargetEnv::Preview))
        .await
        .unwrap();
    assert!(matches!(outcome, DeployOutcome::Deployed(_)));

    let calls = harness.plane.calls();
    assert!(calls
        .iter()
        .any(|c| matches!(c, Call::UpsertBranch(b) if b == "feature/login")));
    assert!(calls.iter().any(|c| matches!(
        c,
        Call::ConnectProject { env, branch: Some(b) } if env == "preview" && b == "feature/login"
    )));
    assert!(!calls.iter().any(|c| matches!(c, Call::ArchiveBranch(_))));
}

#[tokio::test]
async fn test_preview_branch_flag_wins_over_git() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        PlaneConfig::default(),
        preview_meta("main"),
        FakeBundler::new(manifest()),
        FakeImageBuilder::new(build_ok()),
    );
    let mut request = workspace.request(TargetEnv::Preview);
    request.branch = Some("release/2".to_string());

    harness.session.run(&request).await.unwrap();

    assert_eq!(
        harness
            .plane
            .count(|c| matches!(c, Call::UpsertBranch(b) if b == "release/2")),
        1
    );
}

#[tokio::test]
async fn test_merged_pull_request_archives_without_building() {
    let workspace = Workspace::new();
    let mut meta = preview_meta("feature/done");
    meta.pull_request_number = Some(42);
    meta.pull_request_state = Some(PullRequestState::Merged);
    let harness = Harness::new(
        &workspace,
        PlaneConfig::default(),
        meta,
        FakeBundler::new(manifest()),
        FakeImageBuilder::new(build_ok()),
    );

    let outcome = harness
        .session
        .run(&workspace.request(TargetEnv::Preview))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DeployOutcome::Archived {
            branch: "feature/done".to_string(),
            archived: true,
        }
    );
    let plane = &harness.plane;
    assert_eq!(plane.count(|c| matches!(c, Call::ArchiveBranch(_))), 1);
    assert_eq!(plane.count(|c| matches!(c, Call::UpsertBranch(_))), 0);
    assert_eq!(plane.count(|c| matches!(c, Call::Initialize)), 0);
    assert_eq!(harness.bundler.calls(), 0);
}

#[tokio::test]
async fn test_failed_archive_stops_without_building() {
    let workspace = Workspace::new();
    let mut meta = preview_meta("feature/stale");
    meta.pull_request_number = Some(7);
    meta.pull_request_state = Some(PullRequestState::Closed);
    let harness = Harness::new(
        &workspace,
        PlaneConfig {
            archived: false,
            ..Default::default()
        },
        meta,
        FakeBundler::new(manifest()),
        FakeImageBuilder::new(build_ok()),
    );

    let outcome = harness
        .session
        .run(&workspace.request(TargetEnv::Preview))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DeployOutcome::Archived {
            branch: "feature/stale".to_string(),
            archived: false,
        }
    );
    assert_eq!(harness.plane.count(|c| matches!(c, Call::ArchiveBranch(_))), 1);
    assert_eq!(harness.plane.count(|c| matches!(c, Call::Initialize)), 0);
    assert_eq!(harness.bundler.calls(), 0);
    assert_eq!(harness.image_builder.build_count(), 0);
    assert!(harness
        .reporter
        .captured()
        .iter()
        .any(|line| line.contains("Failed to archive preview branch \"feature/stale\"")));
}

#[tokio::test]
async fn test_upsert_without_branch_environment_fails() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        PlaneConfig {
            upsert_returns_branch: false,
            ..Default::default()
        },
        preview_meta("feature/login"),
        FakeBundler::new(manifest()),
        FakeImageBuilder::new(build_ok()),
    );

    let err = harness
        .session
        .run(&workspace.request(TargetEnv::Preview))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Deployment);
    assert_eq!(err.to_string(), "Failed to create branch \"feature/login\"");
    let plane = &harness.plane;
    assert_eq!(plane.count(|c| matches!(c, Call::UpsertBranch(_))), 1);
    assert_eq!(plane.count(|c| matches!(c, Call::ForcedExternals)), 0);
    assert_eq!(plane.count(|c| matches!(c, Call::Initialize)), 0);
    assert_eq!(harness.bundler.calls(), 0);
}

#[tokio::test]
async fn test_already_deployed_short_circuits() {
    let workspace = Workspace::new();
    let harness = Harness::standard(
        &workspace,
        PlaneConfig {
            initialize_status: DeploymentStatus::Deployed,
            ..Default::default()
        },
    );

    let outcome = harness
        .session
        .run(&workspace.request(TargetEnv::Prod))
        .await
        .unwrap();

    let DeployOutcome::AlreadyDeployed(summary) = outcome else {
        panic!("expected an already deployed outcome, got {:?}", outcome);
    };
    assert_eq!(summary.task_count, 2);
    assert_eq!(harness.plane.count(|c| matches!(c, Call::Finalize(_))), 0);
    assert!(harness.plane.fail_requests().is_empty());
    assert_eq!(harness.image_builder.build_count(), 0);
}

#[tokio::test]
async fn test_dry_run_stops_after_bundle() {
    let workspace = Workspace::new();
    let harness = Harness::standard(&workspace, PlaneConfig::default());
    let mut request = workspace.request(TargetEnv::Prod);
    request.dry_run = true;

    let outcome = harness.session.run(&request).await.unwrap();

    let DeployOutcome::DryRun { destination } = outcome else {
        panic!("expected a dry run outcome, got {:?}", outcome);
    };
    assert!(destination.exists());
    assert_eq!(harness.plane.count(|c| matches!(c, Call::Initialize)), 0);
    assert_eq!(harness.image_builder.build_count(), 0);
}

#[tokio::test]
async fn test_env_vars_are_synced_before_image_build() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        PlaneConfig::default(),
        GitMeta::default(),
        FakeBundler::new(manifest_with_sync()),
        FakeImageBuilder::new(build_ok()),
    );

    harness
        .session
        .run(&workspace.request(TargetEnv::Prod))
        .await
        .unwrap();

    let imports: Vec<_> = harness
        .plane
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::ImportEnvVars(request) => Some(request),
            _ => None,
        })
        .collect();
    assert_eq!(imports.len(), 1);
    assert!(imports[0].override_existing);
    assert_eq!(imports[0].parent_variables, None);
    assert_eq!(
        imports[0].variables.get("API_KEY").map(String::as_str),
        Some("secret")
    );
}

#[tokio::test]
async fn test_skip_sync_env_vars() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        PlaneConfig::default(),
        GitMeta::default(),
        FakeBundler::new(manifest_with_sync()),
        FakeImageBuilder::new(build_ok()),
    );
    let mut request = workspace.request(TargetEnv::Prod);
    request.skip_sync_env_vars = true;

    let outcome = harness.session.run(&request).await.unwrap();

    assert!(matches!(outcome, DeployOutcome::Deployed(_)));
    assert_eq!(
        harness.plane.count(|c| matches!(c, Call::ImportEnvVars(_))),
        0
    );
}

#[tokio::test]
async fn test_bundle_failure_happens_before_initialize() {
    let workspace = Workspace::new();
    let harness = Harness::new(
        &workspace,
        PlaneConfig::default(),
        GitMeta::default(),
        FakeBundler::failing("Build failed: Unexpected token"),
        FakeImageBuilder::new(build_ok()),
    );

    let err = harness
        .session
        .run(&workspace.request(TargetEnv::Prod))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Build);
    assert!(err.should_print());
    assert_eq!(harness.plane.count(|c| matches!(c, Call::Initialize)), 0);
    assert!(harness.plane.fail_requests().is_empty());
}

#[tokio::test]
async fn test_rejected_initialize_is_not_reported_as_failure() {
    let workspace = Workspace::new();
    let harness = Harness::standard(
        &workspace,
        PlaneConfig {
            initialize_fails: true,
            ..Default::default()
        },
    );

    let err = harness
        .session
        .run(&workspace.request(TargetEnv::Prod))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Deployment);
    assert!(err.to_string().contains("over its deployment limit"));
    assert!(harness.plane.fail_requests().is_empty());
}

#[tokio::test]
async fn test_missing_directory_is_validation_error() {
    let workspace = Workspace::new();
    let harness = Harness::standard(&workspace, PlaneConfig::default());
    let mut request = workspace.request(TargetEnv::Prod);
    request.dir = "staging".to_string();
    request.project_path = workspace.project.path().join("staging");

    let err = harness.session.run(&request).await.unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("--env staging"));
    assert!(harness.plane.calls().is_empty());
}
