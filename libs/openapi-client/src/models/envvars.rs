use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Replaces the variable set of one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEnvVarsRequest {
    pub variables: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_variables: Option<BTreeMap<String, String>>,
    #[serde(rename = "override")]
    pub override_existing: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportEnvVarsResponse {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentVariablesResponse {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}
