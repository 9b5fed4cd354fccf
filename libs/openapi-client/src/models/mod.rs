//! API models

mod branches;
mod deployments;
mod envvars;
mod git;
mod projects;

pub use branches::*;
pub use deployments::*;
pub use envvars::*;
pub use git::*;
pub use projects::*;

use serde::{Deserialize, Serialize};

/// Error response body returned by the control plane on non-2xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
