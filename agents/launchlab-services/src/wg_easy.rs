//! wg-easy client bootstrap
//!
//! Logs in with the admin password, makes sure each default VPN client
//! exists, and saves its WireGuard config (plus a QR code for phones) under
//! the output directory.

use std::path::{Path, PathBuf};

use launchlab_kit::http::{build_client, decode_json_body, normalize_base_url};
use launchlab_kit::readiness::{http_probe, status_only};
use launchlab_kit::{PollOutcome, ReadinessError, ReadinessPoller, StageOutcome, Summary};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{body_text, success_body, ServiceError};

pub const DEFAULT_URL: &str = "http://localhost:51821";
pub const DEFAULT_OUTPUT_DIR: &str = "data/wg-easy/clients";

/// A VPN client to provision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSpec {
    pub name: String,
    /// Also save a QR code, for clients set up from a phone camera
    pub save_qr: bool,
}

impl ClientSpec {
    pub fn new(name: impl Into<String>, save_qr: bool) -> Self {
        Self {
            name: name.into(),
            save_qr,
        }
    }
}

pub fn default_clients() -> Vec<ClientSpec> {
    vec![
        ClientSpec::new("family-laptop", false),
        ClientSpec::new("family-mobile", true),
    ]
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateClientRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClientEntry {
    name: String,
    id: Value,
}

/// wg-easy API client holding the session cookie
pub struct WgEasyClient {
    http: Client,
    base_url: String,
    session: Option<String>,
}

impl WgEasyClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_client()?,
            base_url: normalize_base_url(base_url),
            session: None,
        })
    }

    pub async fn probe(&self) -> PollOutcome<()> {
        http_probe(&self.http, &format!("{}/", self.base_url), status_only).await
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.session {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    /// Open a session; later calls send its cookie.
    pub async fn authenticate(&mut self, password: &str) -> Result<(), ServiceError> {
        info!("Authenticating with wg-easy...");

        let response = self
            .http
            .post(format!("{}/api/session", self.base_url))
            .json(&SessionRequest { password })
            .send()
            .await?;

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session_cookie);
        success_body(response).await?;

        let cookie = cookie.ok_or(ServiceError::MissingSession)?;
        self.session = Some(cookie);
        info!("✓ Authentication successful");
        Ok(())
    }

    /// Create a client; an existing client with the same name is fine.
    pub async fn create_client(&self, name: &str) -> Result<StageOutcome, ServiceError> {
        info!("Creating client: {}", name);

        let response = self
            .request(self.http.post(format!("{}/api/wireguard/client", self.base_url)))
            .json(&CreateClientRequest { name })
            .send()
            .await?;

        match success_body(response).await {
            Ok(_) => {
                info!("✓ Client '{}' created", name);
                Ok(StageOutcome::Applied)
            }
            Err(e) if e.status() == Some(StatusCode::CONFLICT) => {
                info!("ℹ Client '{}' already exists", name);
                Ok(StageOutcome::AlreadySatisfied)
            }
            Err(e) => Err(e),
        }
    }

    /// Look up a client's id by name.
    pub async fn client_id(&self, name: &str) -> Result<String, ServiceError> {
        let response = self
            .request(self.http.get(format!("{}/api/wireguard/client", self.base_url)))
            .send()
            .await?;
        let body = success_body(response).await?;
        let value = decode_json_body(&body).map_err(|e| ServiceError::Decode(e.to_string()))?;
        let clients: Vec<ClientEntry> =
            serde_json::from_value(value).map_err(|e| ServiceError::Decode(e.to_string()))?;

        clients
            .into_iter()
            .find(|c| c.name == name)
            .and_then(|c| match c.id {
                Value::String(id) => Some(id),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .ok_or_else(|| ServiceError::ClientNotFound(name.to_string()))
    }

    /// Download a per-client resource (`configuration`, `qrcode.svg`) to `dest`.
    pub async fn download(&self, id: &str, resource: &str, dest: &Path) -> Result<(), ServiceError> {
        let response = self
            .request(
                self.http
                    .get(format!("{}/api/wireguard/client/{}/{}", self.base_url, id, resource)),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = body_text(response).await;
            return Err(ServiceError::Http { status, body });
        }
        let bytes = response.bytes().await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ServiceError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|source| ServiceError::Io {
                path: dest.to_path_buf(),
                source,
            })
    }
}

/// `Set-Cookie: connect.sid=abc; Path=/; HttpOnly` → `connect.sid=abc`
fn session_cookie(header: &str) -> Option<String> {
    let cookie = header.split(';').next()?.trim();
    (!cookie.is_empty()).then(|| cookie.to_string())
}

/// Result for one client
#[derive(Debug, Clone)]
pub struct ClientResult {
    pub name: String,
    pub created: StageOutcome,
    pub config: Option<PathBuf>,
    pub qr: Option<PathBuf>,
}

impl ClientResult {
    /// Created (or already present) and its config saved
    pub fn is_done(&self) -> bool {
        self.created.is_success() && self.config.is_some()
    }
}

/// Outcome of a run past authentication
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub output_dir: PathBuf,
    pub clients: Vec<ClientResult>,
}

impl ProvisionReport {
    pub fn done(&self) -> usize {
        self.clients.iter().filter(|c| c.is_done()).count()
    }

    pub fn is_success(&self) -> bool {
        self.done() == self.clients.len()
    }

    pub fn summary(&self) -> Summary {
        let summary = Summary::new("WireGuard Client Summary")
            .row("Clients", format!("{}/{}", self.done(), self.clients.len()))
            .row("Output Dir", format!("{}/", self.output_dir.display()));
        self.clients.iter().fold(summary, |summary, client| {
            let mark = if client.is_done() { "✓" } else { "✗" };
            summary.row(client.name.clone(), mark)
        })
    }
}

/// Failures that stop before any client is touched
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    #[error("Authentication failed: {0}")]
    Auth(#[source] ServiceError),
}

async fn provision_client(client: &WgEasyClient, spec: &ClientSpec, output_dir: &Path) -> ClientResult {
    let mut result = ClientResult {
        name: spec.name.clone(),
        created: StageOutcome::failed("not attempted"),
        config: None,
        qr: None,
    };

    result.created = match client.create_client(&spec.name).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("✗ Failed to create client '{}': {}", spec.name, e);
            return ClientResult {
                created: StageOutcome::failed(e),
                ..result
            };
        }
    };

    info!("Downloading config for: {}", spec.name);
    let id = match client.client_id(&spec.name).await {
        Ok(id) => id,
        Err(e) => {
            error!("✗ {}", e);
            return result;
        }
    };

    let config_path = output_dir.join(format!("{}.conf", spec.name));
    match client.download(&id, "configuration", &config_path).await {
        Ok(()) => {
            info!("✓ Saved config: {}", config_path.display());
            result.config = Some(config_path);
        }
        Err(e) => {
            error!("✗ Failed to download config: {}", e);
            return result;
        }
    }

    if spec.save_qr {
        info!("Downloading QR code for: {}", spec.name);
        let qr_path = output_dir.join(format!("{}-qr.svg", spec.name));
        match client.download(&id, "qrcode.svg", &qr_path).await {
            Ok(()) => {
                info!("✓ Saved QR code: {}", qr_path.display());
                result.qr = Some(qr_path);
            }
            Err(e) => warn!("⚠ Failed to download QR code: {}", e),
        }
    }

    result
}

/// Wait for wg-easy, log in, and provision every client in order.
pub async fn run(
    client: &mut WgEasyClient,
    poller: &ReadinessPoller,
    password: &str,
    clients: &[ClientSpec],
    output_dir: &Path,
) -> Result<ProvisionReport, ProvisionError> {
    let probe_client: &WgEasyClient = client;
    poller.wait(|| probe_client.probe()).await?;
    client.authenticate(password).await.map_err(|e| {
        error!("✗ Authentication failed: {}", e);
        ProvisionError::Auth(e)
    })?;

    let mut results = Vec::with_capacity(clients.len());
    for spec in clients {
        results.push(provision_client(client, spec, output_dir).await);
    }

    Ok(ProvisionReport {
        output_dir: output_dir.to_path_buf(),
        clients: results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SESSION: &str = "connect.sid=s%3Aabc123";

    fn poller() -> ReadinessPoller {
        ReadinessPoller::new("wg-easy")
            .max_attempts(2)
            .interval(Duration::from_millis(1))
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/session"))
            .and(body_json(json!({"password": "wg-secret"})))
            .respond_with(
                ResponseTemplate::new(204)
                    .insert_header("Set-Cookie", format!("{}; Path=/; HttpOnly", SESSION).as_str()),
            )
            .mount(server)
            .await;
    }

    async fn mount_client(server: &MockServer, id: &str, create_status: u16) {
        Mock::given(method("POST"))
            .and(path("/api/wireguard/client"))
            .and(header("Cookie", SESSION))
            .respond_with(ResponseTemplate::new(create_status))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/wireguard/client/{}/configuration", id)))
            .and(header("Cookie", SESSION))
            .respond_with(ResponseTemplate::new(200).set_body_string("[Interface]\nPrivateKey = x\n"))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/wireguard/client/{}/qrcode.svg", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string("<svg/>"))
            .mount(server)
            .await;
    }

    async fn mount_list(server: &MockServer, list: Value) {
        Mock::given(method("GET"))
            .and(path("/api/wireguard/client"))
            .and(header("Cookie", SESSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(list))
            .mount(server)
            .await;
    }

    #[test]
    fn test_session_cookie_strips_attributes() {
        assert_eq!(session_cookie("connect.sid=abc; Path=/; HttpOnly").as_deref(), Some("connect.sid=abc"));
        assert_eq!(session_cookie("connect.sid=abc").as_deref(), Some("connect.sid=abc"));
        assert_eq!(session_cookie(""), None);
    }

    #[tokio::test]
    async fn test_writes_config_and_qr_files() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("clients");
        mount_login(&server).await;
        mount_list(
            &server,
            json!([
                {"id": "a1", "name": "family-laptop", "enabled": true},
                {"id": "b2", "name": "family-mobile", "enabled": true}
            ]),
        )
        .await;
        mount_client(&server, "a1", 200).await;
        mount_client(&server, "b2", 200).await;

        let mut client = WgEasyClient::new(server.uri()).unwrap();
        let report = run(&mut client, &poller(), "wg-secret", &default_clients(), &output)
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(output.join("family-laptop.conf").exists());
        assert!(!output.join("family-laptop-qr.svg").exists());
        assert_eq!(
            std::fs::read_to_string(output.join("family-mobile.conf")).unwrap(),
            "[Interface]\nPrivateKey = x\n"
        );
        assert_eq!(std::fs::read_to_string(output.join("family-mobile-qr.svg")).unwrap(), "<svg/>");
    }

    #[tokio::test]
    async fn test_existing_client_with_numeric_id() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_login(&server).await;
        mount_list(&server, json!([{"id": 7, "name": "family-laptop"}])).await;
        mount_client(&server, "7", 409).await;

        let mut client = WgEasyClient::new(server.uri()).unwrap();
        let report = run(
            &mut client,
            &poller(),
            "wg-secret",
            &[ClientSpec::new("family-laptop", false)],
            dir.path(),
        )
        .await
        .unwrap();

        assert_eq!(report.clients[0].created, StageOutcome::AlreadySatisfied);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_missing_client_fails_run() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_login(&server).await;
        mount_list(&server, json!([])).await;
        mount_client(&server, "a1", 200).await;

        let mut client = WgEasyClient::new(server.uri()).unwrap();
        let report = run(&mut client, &poller(), "wg-secret", &default_clients(), dir.path())
            .await
            .unwrap();

        assert_eq!(report.done(), 0);
        assert!(!report.is_success());
        assert!(report.summary().lines().iter().any(|l| l.ends_with("0/2")));
    }

    #[tokio::test]
    async fn test_qr_failure_keeps_client_done() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_login(&server).await;
        mount_list(&server, json!([{"id": "b2", "name": "family-mobile"}])).await;
        Mock::given(method("GET"))
            .and(path("/api/wireguard/client/b2/qrcode.svg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_client(&server, "b2", 200).await;

        let mut client = WgEasyClient::new(server.uri()).unwrap();
        let report = run(
            &mut client,
            &poller(),
            "wg-secret",
            &[ClientSpec::new("family-mobile", true)],
            dir.path(),
        )
        .await
        .unwrap();

        assert!(report.clients[0].is_done());
        assert!(report.clients[0].qr.is_none());
    }

    #[tokio::test]
    async fn test_login_without_cookie_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/session"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/wireguard/client"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut client = WgEasyClient::new(server.uri()).unwrap();
        let result = run(&mut client, &poller(), "wg-secret", &default_clients(), dir.path()).await;

        assert!(matches!(result, Err(ProvisionError::Auth(ServiceError::MissingSession))));
    }
}
