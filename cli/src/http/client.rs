//! HTTP client implementation

use futures::StreamExt;
use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use openapi_client::models::ErrorResponse;

use crate::http::api::{ApiError, ApiResult};
use crate::utils::{calc_exp_backoff, version_info, CooldownOptions};

/// Header carrying the preview branch for environment-scoped calls
pub const BRANCH_HEADER: &str = "x-taskship-branch";

/// Attempts for idempotent requests
const MAX_GET_ATTEMPTS: u32 = 3;

/// HTTP client for control-plane communication
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: SecretString,
    branch: Option<String>,
    cooldown: CooldownOptions,
}

impl HttpClient {
    /// Create a new HTTP client authorized with `token`
    pub fn new(base_url: &str, token: SecretString) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(format!("taskship-cli/{}", version_info().version))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            branch: None,
            cooldown: CooldownOptions::default(),
        })
    }

    /// Scope environment calls to a preview branch
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(
            header::AUTHORIZATION,
            format!("Bearer {}", self.token.expose_secret()),
        );
        match &self.branch {
            Some(branch) => request.header(BRANCH_HEADER, branch),
            None => request,
        }
    }

    async fn check(response: Response, method: &str, url: &str) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!("HTTP {} {} failed: {} - {}", method, url, status, body);

        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    status.to_string()
                } else {
                    format!("{}: {}", status, body)
                }
            });
        Err(ApiError::with_status(status.as_u16(), message))
    }

    /// Make a GET request, retrying transient failures
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            debug!("GET {} (attempt {})", url, attempt + 1);

            let result = match self.authorize(self.client.get(&url)).send().await {
                Ok(response) => Self::check(response, "GET", &url).await,
                Err(e) => Err(ApiError::from(e)),
            };

            match result {
                Ok(response) => {
                    return response
                        .json()
                        .await
                        .map_err(|e| ApiError::new(format!("Invalid response from {}: {}", url, e)))
                }
                Err(e) if e.is_transient() && attempt + 1 < MAX_GET_ATTEMPTS => {
                    let delay = calc_exp_backoff(&self.cooldown, attempt);
                    warn!("GET {} failed ({}), retrying in {:?}", url, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Make a POST request. Never retried.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .authorize(self.client.post(&url).json(body))
            .send()
            .await?;
        let response = Self::check(response, "POST", &url).await?;

        response
            .json()
            .await
            .map_err(|e| ApiError::new(format!("Invalid response from {}: {}", url, e)))
    }

    /// POST and consume a newline-delimited response body line by line
    pub async fn post_lines<B, F>(&self, path: &str, body: &B, mut on_line: F) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
        F: FnMut(&str) -> ApiResult<()> + Send,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {} (streaming)", url);

        let response = self
            .authorize(self.client.post(&url).json(body))
            .header(header::ACCEPT, "application/x-ndjson")
            .send()
            .await?;
        let response = Self::check(response, "POST", &url).await?;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if !line.is_empty() {
                    on_line(line)?;
                }
            }
        }

        let rest = String::from_utf8_lossy(&buffer);
        let rest = rest.trim();
        if !rest.is_empty() {
            on_line(rest)?;
        }

        Ok(())
    }
}

/// Encode a value for use as a single path segment
pub fn segment(value: &str) -> String {
    let Ok(mut url) = url::Url::parse("http://segment.local/") else {
        return value.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(value);
    }
    url.path().trim_start_matches('/').to_string()
}
