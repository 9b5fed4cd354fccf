use serde::{Deserialize, Serialize};

use super::GitMeta;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertBranchRequest {
    pub branch: String,
    pub env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitMeta>,
}

/// Preview environment backing a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchEnvironment {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub branch_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertBranchResponse {
    #[serde(default)]
    pub branch: Option<BranchEnvironment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveBranchRequest {
    pub branch: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveBranchResponse {
    #[serde(default)]
    pub archived: bool,
}
