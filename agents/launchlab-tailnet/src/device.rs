//! Device lookup
//!
//! Devices are read-only here: found by hostname, never created.

use launchlab_kit::{PollOutcome, ReadinessError, ReadinessPoller};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::client::{ApiError, TailnetClient};

/// A device registered in the tailnet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hostname: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub addresses: Vec<String>,
}

/// Treat an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Device {
    /// First IPv4-shaped address. Anything without a colon counts as IPv4.
    pub fn ipv4_address(&self) -> Option<&str> {
        self.addresses
            .iter()
            .map(String::as_str)
            .find(|addr| !addr.contains(':'))
    }
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default, deserialize_with = "null_as_default")]
    devices: Vec<Device>,
}

/// One readiness attempt: list devices and look for `hostname`.
pub async fn probe_device(client: &TailnetClient, hostname: &str) -> PollOutcome<Device> {
    let listing = match client.probe(&client.tailnet_path("devices")).await {
        Ok(listing) => listing,
        Err(ApiError::Decode(reason)) => return PollOutcome::Malformed(reason),
        Err(_) => return PollOutcome::NotReady,
    };

    let devices: DeviceList = match serde_json::from_value(listing) {
        Ok(devices) => devices,
        Err(e) => return PollOutcome::Malformed(e.to_string()),
    };

    match devices.devices.into_iter().find(|d| d.hostname == hostname) {
        Some(device) => PollOutcome::Ready(device),
        None => {
            debug!(hostname, "Device not registered yet");
            PollOutcome::NotReady
        }
    }
}

/// Wait until `hostname` shows up in the tailnet
pub async fn wait_for_device(
    client: &TailnetClient,
    poller: &ReadinessPoller,
    hostname: &str,
) -> Result<Device, ReadinessError> {
    info!("Waiting for device '{}' to appear in the tailnet...", hostname);

    let device = poller.wait(|| probe_device(client, hostname)).await?;
    info!("✓ Found device: {}", device.name);
    Ok(device)
}
