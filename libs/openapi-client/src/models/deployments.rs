use serde::{Deserialize, Serialize};

use super::GitMeta;

/// Server-side deployment status.
///
/// The control plane is the only party that moves a deployment between
/// these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Pending,
    Building,
    Deploying,
    Deployed,
    Failed,
    Canceled,
    TimedOut,
}

/// Worker engine the deployment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentType {
    Managed,
    V1,
}

/// Credentials for the hosted image builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalBuildData {
    pub build_id: String,
    pub build_token: String,
    pub project_id: String,
}

/// A task indexed from the deployed image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerTask {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub export_name: Option<String>,
}

/// The background worker registered for a deployment once its image is indexed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentWorker {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub tasks: Vec<WorkerTask>,
}

/// Deployment resource as returned by initialize and get
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub short_code: String,
    pub version: String,
    pub status: DeploymentStatus,
    pub content_hash: String,
    #[serde(default)]
    pub external_build_data: Option<ExternalBuildData>,
    pub image_tag: String,
    #[serde(default)]
    pub registry_host: Option<String>,
    /// Raw error payload; shape varies between control-plane versions
    #[serde(default)]
    pub error_data: Option<serde_json::Value>,
    #[serde(default)]
    pub worker: Option<DeploymentWorker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeDeploymentRequest {
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub self_hosted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_meta: Option<GitMeta>,
    #[serde(rename = "type")]
    pub deployment_type: DeploymentType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeDeploymentRequest {
    pub image_reference: String,
    pub self_hosted: bool,
    pub skip_promotion: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeDeploymentResponse {
    pub id: String,
}

/// One line of the newline-delimited finalize stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FinalizeEvent {
    Log { message: String },
    Complete { id: String },
    Error { error: String },
}

/// Structured error reported to (and read back from) the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentErrorData {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailDeploymentRequest {
    pub error: DeploymentErrorData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailDeploymentResponse {
    pub id: String,
}

/// Packages the bundler must never inline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalsResponse {
    #[serde(default)]
    pub externals: Vec<String>,
}
