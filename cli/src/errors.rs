//! Error types for the deploy pipeline

use thiserror::Error;

/// Failure category a pipeline error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    Build,
    Sync,
    Deployment,
}

/// Main error type for the deploy pipeline
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Build(String),

    /// A local build tool the self-hosted path depends on is not installed
    #[error("Failed to find {tool}. Please install it: {install_url}")]
    MissingToolchain { tool: String, install_url: String },

    #[error("{0}")]
    Sync(String),

    #[error("{0}")]
    Deployment(String),

    /// Already reported to the user; the caller must not print it again
    #[error("{message}")]
    SkipLogging { kind: ErrorKind, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Validation(_) => ErrorKind::Validation,
            DeployError::Auth(_) => ErrorKind::Auth,
            DeployError::Build(_) | DeployError::MissingToolchain { .. } => ErrorKind::Build,
            DeployError::Sync(_) => ErrorKind::Sync,
            DeployError::Deployment(_) | DeployError::Io(_) | DeployError::Json(_) => {
                ErrorKind::Deployment
            }
            DeployError::SkipLogging { kind, .. } => *kind,
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Validation => 2,
            ErrorKind::Auth => 3,
            _ => 1,
        }
    }

    /// Whether the terminal handler should print this error
    pub fn should_print(&self) -> bool {
        !matches!(self, DeployError::SkipLogging { .. })
    }

    /// Wrap a failure whose diagnostic has already been printed
    pub fn reported(kind: ErrorKind, message: impl Into<String>) -> Self {
        DeployError::SkipLogging {
            kind,
            message: message.into(),
        }
    }
}
