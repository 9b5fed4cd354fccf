//! Deployment models

use openapi_client::models::DeploymentErrorData;
pub use openapi_client::models::{
    Deployment, DeploymentStatus, DeploymentType, ExternalBuildData, GitMeta, PullRequestState,
};

/// Decode a remote `errorData` payload.
///
/// Control planes have sent a plain string, a `{ name, message, stack,
/// stderr }` object, or an object with only `message`. Anything without a
/// usable message decodes to `None`.
pub fn prepare_deployment_error(raw: &serde_json::Value) -> Option<DeploymentErrorData> {
    match raw {
        serde_json::Value::String(message) if !message.trim().is_empty() => {
            Some(DeploymentErrorData {
                name: "Error".to_string(),
                message: message.clone(),
                stack: None,
                stderr: None,
            })
        }
        serde_json::Value::Object(map) => {
            let text = |key: &str| {
                map.get(key)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
            };

            let message = text("message")?;
            Some(DeploymentErrorData {
                name: text("name").unwrap_or_else(|| "Error".to_string()),
                message,
                stack: text("stack"),
                stderr: text("stderr"),
            })
        }
        _ => None,
    }
}
