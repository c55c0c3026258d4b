//! Tailnet API Client
//!
//! Thin wrapper over the control-plane v2 REST API. Every call carries the
//! bearer token and negotiates JSON. Failures come back as [`ApiError`] so
//! stages can log precisely and carry on.

use std::time::Duration;

use launchlab_kit::http::{build_client, decode_json_body, normalize_base_url, CALL_TIMEOUT, PROBE_TIMEOUT};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Public control-plane API
pub const TAILSCALE_API: &str = "https://api.tailscale.com/api/v2";

/// Failure of a single API call
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response; `body` is the raw response text
    #[error("API error ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    /// Connection refused, DNS failure, timeout
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// 2xx response with a body we could not interpret
    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Authenticated control-plane client
pub struct TailnetClient {
    http: Client,
    api_token: String,
    tailnet: String,
    base_url: String,
    timeout: Duration,
}

impl TailnetClient {
    /// Create a client for one tailnet
    pub fn new(api_token: impl Into<String>, tailnet: impl Into<String>) -> Result<Self, ApiError> {
        let http = build_client().map_err(ApiError::Network)?;

        Ok(Self {
            http,
            api_token: api_token.into(),
            tailnet: tailnet.into(),
            base_url: TAILSCALE_API.to_string(),
            timeout: CALL_TIMEOUT,
        })
    }

    /// Point the client at another API root (tests, self-hosted control planes)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(url);
        self
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tailnet(&self) -> &str {
        &self.tailnet
    }

    /// Path of a tailnet-scoped resource, e.g. `tailnet_path("acl")`
    pub fn tailnet_path(&self, resource: &str) -> String {
        format!("/tailnet/{}/{}", self.tailnet, resource)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request::<()>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    /// GET and deserialize into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.get(path).await?;
        serde_json::from_value(value).map_err(|e| {
            warn!("✗ Unexpected Error: {} returned an unexpected shape: {}", path, e);
            ApiError::Decode(e.to_string())
        })
    }

    /// Issue a call and log any failure at the point it happens.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        let result = self.execute(method, path, body, self.timeout).await;

        if let Err(e) = &result {
            match e {
                ApiError::Rejected { status, body } => {
                    warn!(path, "✗ API Error ({}): {}", status.as_u16(), body)
                }
                ApiError::Network(source) => warn!(path, "✗ Network Error: {}", source),
                ApiError::Decode(reason) => warn!(path, "✗ Unexpected Error: {}", reason),
            }
        }

        result
    }

    /// GET used by readiness probes: short timeout, failures only at debug level.
    pub async fn probe(&self, path: &str) -> Result<Value, ApiError> {
        let result = self.execute::<()>(Method::GET, path, None, PROBE_TIMEOUT).await;
        if let Err(e) = &result {
            debug!(path, error = %e, "Probe call failed");
        }
        result
    }

    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        timeout: Duration,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "Calling tailnet API");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.api_token)
            .header(ACCEPT, "application/json")
            .timeout(timeout);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiError::Network)?;
        let status = response.status();
        let text = response.text().await.map_err(ApiError::Network)?;

        if !status.is_success() {
            return Err(ApiError::Rejected { status, body: text });
        }

        decode_json_body(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
