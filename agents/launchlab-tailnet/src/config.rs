//! Tailnet agent configuration

use std::fmt;
use std::time::Duration;

use launchlab_kit::ReadinessPoller;
use thiserror::Error;

use crate::client::TAILSCALE_API;

pub const DEFAULT_HOSTNAME: &str = "launchlab";
pub const DEFAULT_SUBNET: &str = "172.20.0.0/16";
pub const DEFAULT_NAMESERVER: &str = "172.20.0.4";

/// A required setting is absent. The agent treats this as "not configured"
/// and skips rather than failing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
}

/// Everything one run needs
#[derive(Clone)]
pub struct TailnetConfig {
    pub api_token: String,
    pub tailnet: String,
    pub hostname: String,
    pub subnet: String,
    pub nameserver: String,
    pub api_base: String,
    pub wait_attempts: u32,
    pub poll_interval: Duration,
}

impl TailnetConfig {
    /// Build from the two required values; empty strings count as missing.
    pub fn new(api_token: Option<String>, tailnet: Option<String>) -> Result<Self, ConfigError> {
        let api_token = required(api_token, "TAILSCALE_API_TOKEN")?;
        let tailnet = required(tailnet, "TAILSCALE_TAILNET")?;

        Ok(Self {
            api_token,
            tailnet,
            hostname: DEFAULT_HOSTNAME.to_string(),
            subnet: DEFAULT_SUBNET.to_string(),
            nameserver: DEFAULT_NAMESERVER.to_string(),
            api_base: TAILSCALE_API.to_string(),
            wait_attempts: ReadinessPoller::DEFAULT_ATTEMPTS,
            poll_interval: ReadinessPoller::DEFAULT_INTERVAL,
        })
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn subnet(mut self, subnet: impl Into<String>) -> Self {
        self.subnet = subnet.into();
        self
    }

    pub fn nameserver(mut self, nameserver: impl Into<String>) -> Self {
        self.nameserver = nameserver.into();
        self
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn wait_attempts(mut self, attempts: u32) -> Self {
        self.wait_attempts = attempts;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poller for the device wait
    pub fn poller(&self) -> ReadinessPoller {
        ReadinessPoller::new(format!("device '{}'", self.hostname))
            .max_attempts(self.wait_attempts)
            .interval(self.poll_interval)
    }
}

// Keep the token out of logs
impl fmt::Debug for TailnetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailnetConfig")
            .field("api_token", &"<redacted>")
            .field("tailnet", &self.tailnet)
            .field("hostname", &self.hostname)
            .field("subnet", &self.subnet)
            .field("nameserver", &self.nameserver)
            .field("api_base", &self.api_base)
            .field("wait_attempts", &self.wait_attempts)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}
