//! LaunchLab Service Agents
//!
//! First-boot setup for the self-hosted services, replacing each one's
//! setup wizard with a few API calls.
//!
//! ## Binaries
//!
//! - `init-immich`: create the photo library admin
//! - `init-jellyfin`: run the media server startup wizard
//! - `init-portainer`: create the container UI admin
//! - `init-wg-easy`: create VPN clients and save their configs
//!
//! Every agent first waits for its service with
//! [`launchlab_kit::ReadinessPoller`], and treats "already set up" as success.

use std::fmt;
use std::path::PathBuf;

use reqwest::{Response, StatusCode};
use thiserror::Error;
use tracing::debug;

pub mod immich;
pub mod jellyfin;
pub mod portainer;
pub mod wg_easy;

pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "changeme";

/// Errors from service API calls
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("No session cookie received")]
    MissingSession,

    #[error("Client '{0}' not found")]
    ClientNotFound(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    /// Status code of an HTTP rejection
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ServiceError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Read the body of a 2xx response, or turn anything else into `ServiceError::Http`.
pub(crate) async fn success_body(response: Response) -> Result<String, ServiceError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(ServiceError::Http { status, body })
    }
}

/// Body text of a response that is only logged or searched.
///
/// A body that cannot be read is logged at debug level and treated as empty.
pub(crate) async fn body_text(response: Response) -> String {
    let url = response.url().to_string();
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(url, error = %e, "Response body could not be read");
            String::new()
        }
    }
}

/// Username and password for a service admin account
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
