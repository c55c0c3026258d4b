//! Jellyfin startup wizard
//!
//! Runs the first-start wizard over the API. Every step is best-effort:
//! Jellyfin rejects the user step when the user already exists and the
//! remaining steps still apply.

use launchlab_kit::http::{build_client, normalize_base_url};
use launchlab_kit::readiness::{http_probe, json_body};
use launchlab_kit::{PollOutcome, ReadinessError, ReadinessPoller, StageOutcome, Summary};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{success_body, AdminCredentials, ServiceError};

pub const DEFAULT_URL: &str = "http://jellyfin:8096";

/// One call of the startup wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Configuration,
    User,
    RemoteAccess,
    Complete,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::Configuration,
        WizardStep::User,
        WizardStep::RemoteAccess,
        WizardStep::Complete,
    ];

    pub fn path(self) -> &'static str {
        match self {
            WizardStep::Configuration => "/Startup/Configuration",
            WizardStep::User => "/Startup/User",
            WizardStep::RemoteAccess => "/Startup/RemoteAccess",
            WizardStep::Complete => "/Startup/Complete",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WizardStep::Configuration => "Initial configuration",
            WizardStep::User => "Admin user",
            WizardStep::RemoteAccess => "Remote access",
            WizardStep::Complete => "Wizard complete",
        }
    }

    fn body(self, creds: &AdminCredentials) -> Value {
        match self {
            WizardStep::Configuration => json!({
                "UICulture": "en-US",
                "MetadataCountryCode": "US",
                "PreferredMetadataLanguage": "en"
            }),
            WizardStep::User => json!({
                "Name": creds.username,
                "Password": creds.password
            }),
            WizardStep::RemoteAccess => json!({
                "EnableRemoteAccess": true,
                "EnableAutomaticPortMapping": false
            }),
            WizardStep::Complete => json!({}),
        }
    }
}

/// What the wizard pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardReport {
    /// Jellyfin reported the wizard as done before we started
    AlreadyCompleted,
    Ran(Vec<(WizardStep, StageOutcome)>),
}

impl WizardReport {
    pub fn summary(&self) -> Summary {
        let summary = Summary::new("Jellyfin Setup Summary");
        match self {
            WizardReport::AlreadyCompleted => summary.row("Startup Wizard", "✓ (already completed)"),
            WizardReport::Ran(steps) => steps
                .iter()
                .fold(summary, |summary, (step, outcome)| summary.row(step.label(), outcome.mark())),
        }
    }
}

/// Jellyfin API client
pub struct JellyfinClient {
    http: Client,
    base_url: String,
}

impl JellyfinClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_client()?,
            base_url: normalize_base_url(base_url),
        })
    }

    /// Ready once public system info is served; yields `StartupWizardCompleted`.
    pub async fn public_info(&self) -> PollOutcome<bool> {
        let url = format!("{}/System/Info/Public", self.base_url);
        http_probe(&self.http, &url, |body| match json_body(body, |v| v.as_object().cloned()) {
            PollOutcome::Ready(info) => PollOutcome::Ready(
                info.get("StartupWizardCompleted")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            ),
            PollOutcome::NotReady => PollOutcome::Malformed("expected a JSON object".to_string()),
            PollOutcome::Malformed(reason) => PollOutcome::Malformed(reason),
        })
        .await
    }

    async fn post_step(&self, step: WizardStep, creds: &AdminCredentials) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, step.path()))
            .json(&step.body(creds))
            .send()
            .await?;
        success_body(response).await.map(drop)
    }

    /// Run every wizard step, logging failures and moving on.
    pub async fn run_wizard(&self, creds: &AdminCredentials) -> Vec<(WizardStep, StageOutcome)> {
        let mut results = Vec::with_capacity(WizardStep::ALL.len());

        for step in WizardStep::ALL {
            let outcome = match self.post_step(step, creds).await {
                Ok(()) => {
                    info!("✓ {}", step.label());
                    StageOutcome::Applied
                }
                Err(e) => {
                    warn!("⚠ {} failed: {}", step.label(), e);
                    StageOutcome::failed(e)
                }
            };
            results.push((step, outcome));
        }

        results
    }
}

/// Wait for Jellyfin, then run the wizard if it has not been completed.
pub async fn run(
    client: &JellyfinClient,
    poller: &ReadinessPoller,
    creds: &AdminCredentials,
) -> Result<WizardReport, ReadinessError> {
    let completed = poller.wait(|| client.public_info()).await?;

    if completed {
        info!("ℹ Startup wizard already completed, skipping");
        return Ok(WizardReport::AlreadyCompleted);
    }

    info!("Running startup wizard...");
    Ok(WizardReport::Ran(client.run_wizard(creds).await))
}
