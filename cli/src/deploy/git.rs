//! Version-control metadata for a checkout

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::models::deployment::{GitMeta, PullRequestState};

/// Read-only view of the project's version control
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Metadata for the checkout containing `dir`. Never fails; missing
    /// information is left empty.
    async fn git_meta(&self, dir: &Path) -> GitMeta;
}

/// Resolves metadata with the `git` CLI and CI-provided variables
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    /// CI event payload describing the triggering pull request
    pub event_path: Option<PathBuf>,
    /// Source branch of a pull-request build
    pub head_ref: Option<String>,
    pub pr_number: Option<u64>,
    pub pr_state: Option<PullRequestState>,
}

impl GitCli {
    /// Capture CI variables from the process environment
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            event_path: var("GITHUB_EVENT_PATH").map(PathBuf::from),
            head_ref: var("GITHUB_HEAD_REF"),
            pr_number: var("TASKSHIP_PR_NUMBER").and_then(|n| n.trim().parse().ok()),
            pr_state: var("TASKSHIP_PR_STATE").and_then(|s| parse_pr_state(&s)),
        }
    }

    async fn pull_request(&self) -> (Option<u64>, Option<PullRequestState>) {
        let mut number = self.pr_number;
        let mut state = self.pr_state;

        if let Some(path) = &self.event_path {
            match tokio::fs::read_to_string(path).await {
                Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                    Ok(event) => {
                        let (event_number, event_state) = pull_request_from_event(&event);
                        number = number.or(event_number);
                        state = state.or(event_state);
                    }
                    Err(e) => debug!("Ignoring unreadable CI event payload: {}", e),
                },
                Err(e) => debug!(path = %path.display(), "Cannot read CI event payload: {}", e),
            }
        }

        (number, state)
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn git_meta(&self, dir: &Path) -> GitMeta {
        let (pull_request_number, pull_request_state) = self.pull_request().await;

        if git(dir, &["rev-parse", "--is-inside-work-tree"]).await.as_deref() != Some("true") {
            debug!(dir = %dir.display(), "Not a git checkout");
            return GitMeta {
                branch_name: self.head_ref.clone(),
                pull_request_number,
                pull_request_state,
                ..GitMeta::default()
            };
        }

        // Detached HEAD reports "HEAD" instead of a branch
        let branch_name = self.head_ref.clone().or(
            git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
                .await
                .filter(|b| b != "HEAD"),
        );

        let dirty = git(dir, &["status", "--porcelain"])
            .await
            .map(|s| !s.is_empty())
            .unwrap_or(false);

        GitMeta {
            remote_url: git(dir, &["remote", "get-url", "origin"]).await,
            commit_sha: git(dir, &["rev-parse", "HEAD"]).await,
            commit_message: git(dir, &["log", "-1", "--pretty=%s"]).await,
            commit_author_name: git(dir, &["log", "-1", "--pretty=%an"]).await,
            branch_name,
            dirty,
            pull_request_number,
            pull_request_state,
        }
    }
}

/// Run a git subcommand and return its trimmed stdout on success
async fn git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!stdout.is_empty()).then_some(stdout)
}

fn parse_pr_state(value: &str) -> Option<PullRequestState> {
    match value.trim().to_lowercase().as_str() {
        "open" | "opened" | "reopened" | "synchronize" => Some(PullRequestState::Open),
        "merged" => Some(PullRequestState::Merged),
        "closed" => Some(PullRequestState::Closed),
        _ => None,
    }
}

/// Pull request number and state from a GitHub event payload
pub fn pull_request_from_event(event: &Value) -> (Option<u64>, Option<PullRequestState>) {
    let Some(pr) = event.get("pull_request") else {
        return (None, None);
    };

    let number = pr
        .get("number")
        .and_then(Value::as_u64)
        .or_else(|| event.get("number").and_then(Value::as_u64));

    let merged = pr.get("merged").and_then(Value::as_bool).unwrap_or(false);
    let state = match pr.get("state").and_then(Value::as_str) {
        Some("closed") if merged => Some(PullRequestState::Merged),
        Some(state) => parse_pr_state(state),
        None => None,
    };

    (number, state)
}

/// Strip a `refs/heads/` prefix from a branch reference
pub fn branch_name(reference: &str) -> &str {
    reference.strip_prefix("refs/heads/").unwrap_or(reference)
}
