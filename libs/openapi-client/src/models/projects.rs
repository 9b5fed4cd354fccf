use serde::{Deserialize, Serialize};

/// Caller identity resolved from an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmIResponse {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub dashboard_url: String,
}

/// Environment-scoped credentials for a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEnvResponse {
    pub api_key: String,
    pub api_url: String,
    pub project_id: String,
    #[serde(default)]
    pub name: Option<String>,
}
