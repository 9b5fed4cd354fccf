//! Build manifest produced by the bundler

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Variables the deploy pushes to the control plane
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    /// Task-runtime variables for the target environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Variables for the parent environment of a preview branch
    #[serde(default)]
    pub parent_env: BTreeMap<String, String>,
}

impl SyncPayload {
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.parent_env.is_empty()
    }

    pub fn len(&self) -> usize {
        self.env.len() + self.parent_env.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    /// Build-time variables passed to the image build
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploySection {
    #[serde(default)]
    pub sync: Option<SyncPayload>,
}

/// The bundler's description of a built project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    /// Identity of the build output
    pub content_hash: String,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub deploy: DeploySection,
}

impl BuildManifest {
    /// Variables to sync, if the manifest declares any
    pub fn sync_payload(&self) -> Option<&SyncPayload> {
        self.deploy.sync.as_ref().filter(|sync| !sync.is_empty())
    }
}
