//! DNS Configurator
//!
//! Points the tailnet at a single global nameserver, then turns on the
//! override-local-DNS preference. The nameserver list is overwritten.

use launchlab_kit::StageOutcome;
use serde::Serialize;
use tracing::{info, warn};

use crate::client::TailnetClient;

#[derive(Debug, Serialize)]
struct NameserversRequest<'a> {
    dns: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct DnsPreferences {
    #[serde(rename = "magicDNS")]
    magic_dns: bool,
}

/// Set `nameserver` as the only global nameserver and enable the override.
///
/// The preference write is skipped when the nameserver write fails.
pub async fn configure_dns(client: &TailnetClient, nameserver: &str) -> StageOutcome {
    info!("Configuring DNS (nameserver: {})...", nameserver);
    info!("  Note: Using resolver subnet IP (accessible via subnet routing)");

    let request = NameserversRequest { dns: [nameserver] };
    if let Err(e) = client.post(&client.tailnet_path("dns/nameservers"), &request).await {
        warn!("✗ Failed to configure DNS");
        return StageOutcome::failed(e);
    }
    info!("✓ DNS nameserver configured");

    info!("Enabling 'Override local DNS'...");
    let preferences = DnsPreferences { magic_dns: true };
    match client.post(&client.tailnet_path("dns/preferences"), &preferences).await {
        Ok(_) => {
            info!("✓ DNS preferences updated (MagicDNS enabled)");
            StageOutcome::Applied
        }
        Err(e) => {
            warn!("⚠ DNS nameserver set, but failed to update preferences");
            StageOutcome::partial(format!("nameserver set, preferences not applied: {}", e))
        }
    }
}
