//! Resolve the caller's credentials into an authorized context

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::http::api::AccountApi;
use crate::http::client::HttpClient;
use crate::storage::layout::StorageLayout;
use crate::storage::profiles::{read_profile, DEFAULT_API_URL};

const LOGIN_HINT: &str = "You must login first. Use the `login` CLI command.";

/// Authorization for one run, threaded through every stage
#[derive(Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub api_url: String,
    pub dashboard_url: String,
    pub account: Arc<dyn AccountApi>,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("user_id", &self.user_id)
            .field("api_url", &self.api_url)
            .field("dashboard_url", &self.dashboard_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<AuthContext, DeployError>;
}

/// Authenticates with a stored login profile or an access token override
pub struct ProfileAuthenticator {
    pub layout: StorageLayout,
    pub profile: String,
    pub api_url_override: Option<String>,
    pub token_override: Option<SecretString>,
}

impl ProfileAuthenticator {
    async fn credentials(&self) -> Result<(String, SecretString), DeployError> {
        let profile = read_profile(&self.layout.profiles_file(), &self.profile)
            .await
            .map_err(|e| DeployError::Auth(format!("{}\n\n{}", LOGIN_HINT, e)))?;

        let api_url = self
            .api_url_override
            .clone()
            .or_else(|| profile.as_ref().map(|p| p.api_url.clone()))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let token = match (&self.token_override, profile) {
            (Some(token), _) => token.clone(),
            (None, Some(profile)) => profile.access_token,
            (None, None) => return Err(DeployError::Auth(LOGIN_HINT.to_string())),
        };

        Ok((api_url, token))
    }
}

#[async_trait]
impl Authenticator for ProfileAuthenticator {
    async fn authenticate(&self) -> Result<AuthContext, DeployError> {
        let (api_url, token) = self.credentials().await?;
        debug!(profile = %self.profile, api_url = %api_url, "Authenticating");

        let client = HttpClient::new(&api_url, token)
            .map_err(|e| DeployError::Auth(format!("{}\n\n{}", LOGIN_HINT, e)))?;

        let whoami = client.whoami_checked(&api_url).await?;
        info!(user_id = %whoami.user_id, "Authenticated");

        Ok(AuthContext {
            user_id: whoami.user_id,
            api_url,
            dashboard_url: whoami.dashboard_url.trim_end_matches('/').to_string(),
            account: Arc::new(client),
        })
    }
}

impl HttpClient {
    /// `whoami` with login-specific error messages
    async fn whoami_checked(
        &self,
        api_url: &str,
    ) -> Result<openapi_client::models::WhoAmIResponse, DeployError> {
        self.whoami().await.map_err(|e| {
            if e.connect {
                DeployError::Auth(format!(
                    "Failed to connect to {}. Are you sure it's the correct URL?",
                    api_url
                ))
            } else {
                DeployError::Auth(format!("{}\n\n{}", LOGIN_HINT, e))
            }
        })
    }
}
