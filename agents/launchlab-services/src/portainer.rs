//! Portainer admin bootstrap

use launchlab_kit::http::{build_client, decode_json_body, normalize_base_url};
use launchlab_kit::readiness::{http_probe, status_only};
use launchlab_kit::{PollOutcome, ReadinessError, ReadinessPoller, StageOutcome};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::{body_text, success_body, AdminCredentials, ServiceError};

pub const DEFAULT_URL: &str = "http://portainer:9000";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AdminInitRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AdminInitResponse {
    #[serde(default)]
    id: Option<Value>,
}

/// Portainer API client
pub struct PortainerClient {
    http: Client,
    base_url: String,
}

impl PortainerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_client()?,
            base_url: normalize_base_url(base_url),
        })
    }

    pub async fn status(&self) -> PollOutcome<()> {
        http_probe(&self.http, &format!("{}/api/status", self.base_url), status_only).await
    }

    /// Whether an admin user is already set up.
    ///
    /// Errors are returned to the caller, which treats them as "absent".
    pub async fn admin_exists(&self) -> Result<bool, ServiceError> {
        let response = self
            .http
            .get(format!("{}/api/users/admin/check", self.base_url))
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::OK => {
                let body = response.text().await?;
                let value = decode_json_body(&body).map_err(|e| ServiceError::Decode(e.to_string()))?;
                Ok(is_truthy(&value))
            }
            status => Err(ServiceError::Http {
                status,
                body: body_text(response).await,
            }),
        }
    }

    /// Create the initial admin user
    pub async fn init_admin(&self, creds: &AdminCredentials) -> StageOutcome {
        info!("Creating admin user: {}", creds.username);

        let request = AdminInitRequest {
            username: &creds.username,
            password: &creds.password,
        };

        let result = match self
            .http
            .post(format!("{}/api/users/admin/init", self.base_url))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => success_body(response).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(body) => {
                let user_id = serde_json::from_str::<AdminInitResponse>(&body)
                    .ok()
                    .and_then(|r| r.id)
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                info!("✓ Admin user created successfully");
                info!("  Username: {}", creds.username);
                info!("  User ID: {}", user_id);
                StageOutcome::Applied
            }
            Err(ServiceError::Http { status, .. }) if status == StatusCode::CONFLICT => {
                info!("ℹ Admin user already exists");
                StageOutcome::AlreadySatisfied
            }
            Err(ServiceError::Http { status, body }) => {
                error!("✗ Failed to create admin: HTTP {}", status);
                error!("  Response: {}", body);
                StageOutcome::failed(format!("HTTP {}", status))
            }
            Err(e) => {
                error!("✗ Failed to create admin: {}", e);
                StageOutcome::failed(e)
            }
        }
    }
}

// null, false, 0 and empty strings or containers are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Wait for Portainer, then create the admin unless one exists.
pub async fn run(
    client: &PortainerClient,
    poller: &ReadinessPoller,
    creds: &AdminCredentials,
) -> Result<StageOutcome, ReadinessError> {
    poller.wait(|| client.status()).await?;

    match client.admin_exists().await {
        Ok(true) => {
            info!("ℹ Admin user already exists, skipping initialization");
            return Ok(StageOutcome::AlreadySatisfied);
        }
        Ok(false) => {}
        Err(e) => debug!(error = %e, "Admin check failed, assuming no admin"),
    }

    Ok(client.init_admin(creds).await)
}
