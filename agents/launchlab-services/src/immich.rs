//! Immich admin bootstrap
//!
//! Immich has no admin until someone signs up; the first sign-up through
//! `admin-sign-up` becomes the admin. Once one exists the endpoint answers
//! 400 with an "already exists" message, which counts as success.

use launchlab_kit::http::{build_client, normalize_base_url};
use launchlab_kit::readiness::{http_probe, json_body};
use launchlab_kit::{PollOutcome, ReadinessError, ReadinessPoller, StageOutcome};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::body_text;

pub const DEFAULT_URL: &str = "http://immich-server:3001";
pub const DEFAULT_EMAIL: &str = "admin@homelab.local";
pub const DEFAULT_NAME: &str = "Admin";

/// Messages Immich uses when the admin already exists
const ALREADY_EXISTS: [&str; 2] = ["Admin already exists", "User already exists"];

/// Admin account to create
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
struct AdminSignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Immich API client
pub struct ImmichClient {
    http: Client,
    base_url: String,
}

impl ImmichClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_client()?,
            base_url: normalize_base_url(base_url),
        })
    }

    /// Ready once the ping endpoint answers `{"res": "pong"}`
    pub async fn ping(&self) -> PollOutcome<()> {
        let url = format!("{}/api/server-info/ping", self.base_url);
        http_probe(&self.http, &url, |body| {
            json_body(body, |v| (v.get("res").and_then(Value::as_str) == Some("pong")).then_some(()))
        })
        .await
    }

    /// Sign up the admin account
    pub async fn create_admin(&self, account: &AdminAccount) -> StageOutcome {
        info!("Creating admin user: {}", account.email);

        let request = AdminSignUpRequest {
            email: &account.email,
            password: &account.password,
            name: &account.name,
        };

        let response = match self
            .http
            .post(format!("{}/api/auth/admin-sign-up", self.base_url))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("✗ Failed to create admin: {}", e);
                return StageOutcome::failed(e);
            }
        };

        let status = response.status();
        let body = body_text(response).await;

        if status.is_success() {
            let user_id = serde_json::from_str::<SignUpResponse>(&body)
                .ok()
                .and_then(|r| r.id)
                .unwrap_or_else(|| "N/A".to_string());
            info!("✓ Admin user created successfully");
            info!("  Email: {}", account.email);
            info!("  User ID: {}", user_id);
            return StageOutcome::Applied;
        }

        if status == StatusCode::BAD_REQUEST {
            if ALREADY_EXISTS.iter().any(|marker| body.contains(marker)) {
                info!("ℹ Admin user already exists, skipping creation");
                return StageOutcome::AlreadySatisfied;
            }
            error!("✗ Bad request: {}", body);
            return StageOutcome::failed(format!("bad request: {}", body));
        }

        error!("✗ HTTP error {}", status);
        StageOutcome::failed(format!("HTTP {}", status))
    }
}

/// Wait for Immich, then make sure the admin exists.
pub async fn run(
    client: &ImmichClient,
    poller: &ReadinessPoller,
    account: &AdminAccount,
) -> Result<StageOutcome, ReadinessError> {
    poller.wait(|| client.ping()).await?;
    Ok(client.create_admin(account).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn account() -> AdminAccount {
        AdminAccount {
            email: DEFAULT_EMAIL.into(),
            password: "changeme".into(),
            name: DEFAULT_NAME.into(),
        }
    }

    async fn setup() -> (MockServer, ImmichClient) {
        let server = MockServer::start().await;
        let client = ImmichClient::new(server.uri()).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_ping_requires_pong() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api/server-info/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"res": "pong"})))
            .mount(&server)
            .await;

        assert_eq!(client.ping().await, PollOutcome::Ready(()));
    }

    #[tokio::test]
    async fn test_creates_admin() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/api/auth/admin-sign-up"))
            .and(body_json(json!({
                "email": "admin@homelab.local",
                "password": "changeme",
                "name": "Admin"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "u-1"})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client.create_admin(&account()).await, StageOutcome::Applied);
    }

    #[tokio::test]
    async fn test_existing_admin_is_success() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/api/auth/admin-sign-up"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "The server already has an admin",
                "error": "Bad Request: Admin already exists"
            })))
            .mount(&server)
            .await;

        assert_eq!(client.create_admin(&account()).await, StageOutcome::AlreadySatisfied);
    }

    #[tokio::test]
    async fn test_other_bad_request_fails() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/api/auth/admin-sign-up"))
            .respond_with(ResponseTemplate::new(400).set_body_string("email must be an email"))
            .mount(&server)
            .await;

        assert!(matches!(client.create_admin(&account()).await, StageOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_run_times_out_without_sign_up() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api/server-info/ping"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let poller = ReadinessPoller::new("Immich API")
            .max_attempts(2)
            .interval(Duration::from_millis(1));
        let result = run(&client, &poller, &account()).await;
        assert!(matches!(result, Err(ReadinessError::Timeout { .. })));
    }
}
