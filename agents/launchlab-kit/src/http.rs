//! HTTP client construction and body helpers

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

/// Timeout for a single readiness probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a single administrative call
pub const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent by every agent
pub const USER_AGENT: &str = concat!("launchlab-init/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used for administrative calls.
///
/// Probes reuse the same client with a per-request `PROBE_TIMEOUT`.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(CALL_TIMEOUT)
        .build()
}

/// Decode a response body as JSON. An empty body decodes to `{}`.
pub fn decode_json_body(body: &str) -> serde_json::Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(body)
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub fn normalize_base_url(url: impl Into<String>) -> String {
    let url = url.into();
    url.trim_end_matches('/').to_string()
}
