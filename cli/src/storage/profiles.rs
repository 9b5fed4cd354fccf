//! Login profiles

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::Deserialize;

use crate::errors::DeployError;
use crate::filesys::file::File;

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_API_URL: &str = "https://api.taskship.dev";

/// Credentials stored by `taskship login`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub access_token: SecretString,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// Read a named profile; a missing file means no profiles
pub async fn read_profile(file: &File, name: &str) -> Result<Option<Profile>, DeployError> {
    if !file.exists().await {
        return Ok(None);
    }
    let mut profiles: ProfilesFile = file.read_json().await?;
    Ok(profiles.profiles.remove(name))
}
