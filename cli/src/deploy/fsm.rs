//! Observed deployment status
//!
//! The control plane owns every status transition. This tracker only records
//! what the client has seen and rejects observations that would move the
//! deployment backwards, which indicates a stale read.

use crate::models::deployment::DeploymentStatus;

/// Position of a status along the lifecycle
fn rank(status: DeploymentStatus) -> u8 {
    match status {
        DeploymentStatus::Pending => 0,
        DeploymentStatus::Building => 1,
        DeploymentStatus::Deploying => 2,
        DeploymentStatus::Deployed
        | DeploymentStatus::Failed
        | DeploymentStatus::Canceled
        | DeploymentStatus::TimedOut => 3,
    }
}

/// Whether no further transition can happen
pub fn is_terminal(status: DeploymentStatus) -> bool {
    rank(status) == 3
}

/// Monotonic record of remote status observations
#[derive(Debug, Clone)]
pub struct StatusTracker {
    status: DeploymentStatus,
    history: Vec<DeploymentStatus>,
}

impl StatusTracker {
    /// Start tracking from the status returned by initialize
    pub fn new(initial: DeploymentStatus) -> Self {
        Self {
            status: initial,
            history: vec![initial],
        }
    }

    /// Last accepted status
    pub fn status(&self) -> DeploymentStatus {
        self.status
    }

    /// Every accepted status in the order it was observed
    pub fn history(&self) -> &[DeploymentStatus] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        is_terminal(self.status)
    }

    /// Record a freshly fetched status
    pub fn observe(&mut self, next: DeploymentStatus) -> Result<(), String> {
        if next == self.status {
            return Ok(());
        }

        if self.is_terminal() || rank(next) < rank(self.status) {
            return Err(format!(
                "Invalid transition: {:?} -> {:?}",
                self.status, next
            ));
        }

        self.status = next;
        self.history.push(next);
        Ok(())
    }
}
