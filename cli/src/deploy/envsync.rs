//! Environment variable synchronization

use std::collections::BTreeMap;

use openapi_client::models::ImportEnvVarsRequest;
use tracing::{debug, warn};

use crate::http::api::ProjectApi;
use crate::models::manifest::SyncPayload;

/// All-or-nothing result of one sync call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub success: bool,
}

/// Keys in `declared` that are new or differ from `existing`
pub fn changed_keys<'a>(
    existing: &BTreeMap<String, String>,
    declared: &'a BTreeMap<String, String>,
) -> Vec<&'a str> {
    declared
        .iter()
        .filter(|(key, value)| existing.get(*key) != Some(*value))
        .map(|(key, _)| key.as_str())
        .collect()
}

/// Overwrite the variables of `environment_slug` with the declared payload.
///
/// `existing` is only used to log which keys change.
pub async fn sync_env_vars(
    api: &dyn ProjectApi,
    project_ref: &str,
    environment_slug: &str,
    payload: &SyncPayload,
    existing: &BTreeMap<String, String>,
) -> SyncOutcome {
    let request = ImportEnvVarsRequest {
        variables: payload.env.clone(),
        parent_variables: (!payload.parent_env.is_empty()).then(|| payload.parent_env.clone()),
        override_existing: true,
    };

    debug!(
        env = environment_slug,
        count = payload.len(),
        changed = ?changed_keys(existing, &payload.env),
        "Syncing env vars"
    );

    match api
        .import_env_vars(project_ref, environment_slug, &request)
        .await
    {
        Ok(response) => SyncOutcome {
            success: response.success,
        },
        Err(e) => {
            warn!("Env var import failed: {}", e);
            SyncOutcome { success: false }
        }
    }
}
