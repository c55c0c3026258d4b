//! Readiness Poller
//!
//! Blocks until a dependent service answers its liveness probe, or gives up
//! after a fixed number of attempts. Each attempt reports one of three
//! outcomes: ready, not ready yet, or a response that cannot be decoded.
//! Only the last one stops the loop early.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::http::PROBE_TIMEOUT;

/// Result of a single probe attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The service answered and the body satisfied the predicate
    Ready(T),
    /// Network error, non-200 status, or predicate not satisfied yet
    NotReady,
    /// A 200 response whose body could not be decoded
    Malformed(String),
}

/// Why waiting for a service failed
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("{service} not ready after {attempts} attempts")]
    Timeout { service: String, attempts: u32 },

    #[error("{service} returned a malformed readiness response: {reason}")]
    Malformed { service: String, reason: String },
}

/// Fixed-interval poller
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    service: String,
    max_attempts: u32,
    interval: Duration,
}

impl ReadinessPoller {
    /// Default attempt budget (one per second for two minutes)
    pub const DEFAULT_ATTEMPTS: u32 = 120;

    /// Default delay between attempts
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// Create a poller for the named service with the default budget
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            max_attempts: Self::DEFAULT_ATTEMPTS,
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    /// Set the number of attempts (at least one attempt is always made)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the delay between attempts
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run `probe` until it reports ready.
    ///
    /// Not-ready attempts are only visible at debug level. The poller sleeps
    /// between attempts, never after the last one.
    pub async fn wait<T, F, Fut>(&self, mut probe: F) -> Result<T, ReadinessError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PollOutcome<T>>,
    {
        info!("Waiting for {} to be ready...", self.service);
        let started = Instant::now();

        for attempt in 1..=self.max_attempts {
            match probe().await {
                PollOutcome::Ready(value) => {
                    info!(
                        attempt,
                        "✓ {} ready (waited {}s)",
                        self.service,
                        started.elapsed().as_secs()
                    );
                    return Ok(value);
                }
                PollOutcome::NotReady => {
                    debug!(attempt, service = %self.service, "Not ready yet");
                }
                PollOutcome::Malformed(reason) => {
                    error!(attempt, "✗ {} sent an unreadable response: {}", self.service, reason);
                    return Err(ReadinessError::Malformed {
                        service: self.service.clone(),
                        reason,
                    });
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        error!(
            "✗ {} timeout after {} attempts ({}s)",
            self.service,
            self.max_attempts,
            started.elapsed().as_secs()
        );
        Err(ReadinessError::Timeout {
            service: self.service.clone(),
            attempts: self.max_attempts,
        })
    }
}

/// Probe a URL with a plain GET.
///
/// Anything other than HTTP 200 is `NotReady`; a 200 body is handed to
/// `check`, which decides between the three outcomes.
pub async fn http_probe<T, C>(client: &Client, url: &str, check: C) -> PollOutcome<T>
where
    C: FnOnce(&str) -> PollOutcome<T>,
{
    let response = match client.get(url).timeout(PROBE_TIMEOUT).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!(url, error = %e, "Probe request failed");
            return PollOutcome::NotReady;
        }
    };

    if response.status() != StatusCode::OK {
        debug!(url, status = %response.status(), "Probe returned non-200");
        return PollOutcome::NotReady;
    }

    match response.text().await {
        Ok(body) => check(&body),
        Err(e) => {
            debug!(url, error = %e, "Probe body could not be read");
            PollOutcome::NotReady
        }
    }
}

/// Predicate for probes where a 200 status is enough
pub fn status_only(_body: &str) -> PollOutcome<()> {
    PollOutcome::Ready(())
}

/// Parse the body as JSON and hand it to `check`.
///
/// Invalid JSON is `Malformed`; `check` returning `None` is `NotReady`.
pub fn json_body<T>(body: &str, check: impl FnOnce(&Value) -> Option<T>) -> PollOutcome<T> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => check(&value).map_or(PollOutcome::NotReady, PollOutcome::Ready),
        Err(e) => PollOutcome::Malformed(e.to_string()),
    }
}
