//! Orchestrator
//!
//! wait for device → pick its IPv4 address → approve routes →
//! auto-approvers → DNS → summary.
//!
//! The first two steps are fatal. The rest are best-effort and only routes
//! and DNS decide the exit code.

use launchlab_kit::{ReadinessError, StageOutcome, Summary};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::acl::configure_auto_approvers;
use crate::client::{ApiError, TailnetClient};
use crate::config::TailnetConfig;
use crate::device::wait_for_device;
use crate::dns::configure_dns;
use crate::routes::approve_subnet_routes;

const ADMIN_CONSOLE: &str = "https://login.tailscale.com/admin";

/// Failures that end the run before any stage
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    #[error("No IPv4 address found for device '{hostname}'")]
    NoIpv4Address { hostname: String },

    #[error("Failed to create tailnet client: {0}")]
    Client(#[from] ApiError),
}

/// Outcome of a run that got past the fatal steps
#[derive(Debug, Clone)]
pub struct RunReport {
    pub device_id: String,
    pub device_name: String,
    pub tailnet_ip: String,
    pub nameserver: String,
    pub routes: StageOutcome,
    pub auto_approvers: StageOutcome,
    pub dns: StageOutcome,
}

impl RunReport {
    /// Routes and DNS must both succeed; auto-approvers are optional.
    pub fn is_success(&self) -> bool {
        self.routes.is_success() && self.dns.is_success()
    }

    pub fn summary(&self) -> Summary {
        let auto_approvers = if self.auto_approvers.is_success() {
            "✓".to_string()
        } else {
            "⚠ (optional)".to_string()
        };

        // Partial DNS counts as a failure, so the row only shows ✓ or ✗
        let dns = if self.dns.is_success() { "✓" } else { "✗" };

        Summary::new("Automation Summary")
            .row("Device Found", format!("✓ ({})", self.device_name))
            .row("Tailscale IP", self.tailnet_ip.clone())
            .row("Subnet Routes", self.routes.mark())
            .row("Auto-Approvers", auto_approvers)
            .row("DNS Config", format!("{} (nameserver: {})", dns, self.nameserver))
    }
}

/// Process exit status for a finished run
pub fn exit_code(result: &Result<RunReport, BootstrapError>) -> u8 {
    match result {
        Ok(report) if report.is_success() => 0,
        _ => 1,
    }
}

/// Build the client from `config` and run every stage.
pub async fn run(config: &TailnetConfig) -> Result<RunReport, BootstrapError> {
    let client = TailnetClient::new(config.api_token.clone(), config.tailnet.clone())?
        .with_base_url(config.api_base.clone());
    run_with_client(&client, config).await
}

/// Run every stage against an existing client.
pub async fn run_with_client(
    client: &TailnetClient,
    config: &TailnetConfig,
) -> Result<RunReport, BootstrapError> {
    info!("Configuration:");
    info!("  Tailnet: {}", client.tailnet());
    info!("  Hostname: {}", config.hostname);
    info!("  Subnet: {}", config.subnet);
    info!("  Nameserver: {}", config.nameserver);
    info!("");

    let device = wait_for_device(client, &config.poller(), &config.hostname).await?;
    info!("Device ID: {}", device.id);
    info!("");

    let Some(tailnet_ip) = device.ipv4_address().map(str::to_string) else {
        error!("✗ No IPv4 address found for device");
        return Err(BootstrapError::NoIpv4Address {
            hostname: config.hostname.clone(),
        });
    };
    info!("Tailscale IP: {}", tailnet_ip);
    info!("");

    let routes = approve_subnet_routes(client, &device.id, &config.subnet).await;
    if !routes.is_success() {
        warn!("⚠ Continuing despite route approval failure...");
    }
    info!("");

    let auto_approvers = configure_auto_approvers(client, &config.subnet).await;
    if !auto_approvers.is_success() {
        warn!("⚠ Auto-approvers not configured (optional)");
    }
    info!("");

    let dns = configure_dns(client, &config.nameserver).await;
    if !dns.is_success() {
        warn!("⚠ DNS configuration may be incomplete");
    }
    info!("");

    Ok(RunReport {
        device_id: device.id,
        device_name: device.name,
        tailnet_ip,
        nameserver: config.nameserver.clone(),
        routes,
        auto_approvers,
        dns,
    })
}

/// Log the final verdict and follow-up steps for a finished run.
pub fn report(result: &Result<RunReport, BootstrapError>, config: &TailnetConfig) {
    match result {
        Ok(report) => {
            report.summary().log();
            info!("");
            if report.is_success() {
                info!("✓ All automation steps completed successfully!");
                info!("DNS will use {} (via subnet routing)", report.nameserver);
            } else {
                warn!("⚠ Automation partially completed");
                info!("Please check {} for manual configuration", ADMIN_CONSOLE);
            }
        }
        Err(BootstrapError::Readiness(_)) => {
            info!("");
            info!("Manual Configuration Required:");
            info!("  1. Go to: {}/machines", ADMIN_CONSOLE);
            info!("  2. Find device '{}' and approve subnet routes", config.hostname);
            info!("  3. Go to: {}/dns", ADMIN_CONSOLE);
            info!("  4. Add global nameserver and enable 'Override local DNS'");
        }
        Err(e) => error!("✗ {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(routes: StageOutcome, auto: StageOutcome, dns: StageOutcome) -> RunReport {
        RunReport {
            device_id: "1".into(),
            device_name: "launchlab".into(),
            tailnet_ip: "100.64.0.5".into(),
            nameserver: "172.20.0.4".into(),
            routes,
            auto_approvers: auto,
            dns,
        }
    }

    #[test]
    fn test_auto_approvers_do_not_affect_exit_code() {
        let report = report_with(
            StageOutcome::Applied,
            StageOutcome::failed("403"),
            StageOutcome::AlreadySatisfied,
        );
        assert!(report.is_success());
        assert_eq!(exit_code(&Ok(report)), 0);
    }

    #[test]
    fn test_partial_dns_fails_run() {
        let report = report_with(
            StageOutcome::Applied,
            StageOutcome::Applied,
            StageOutcome::partial("preferences"),
        );
        assert_eq!(exit_code(&Ok(report)), 1);
    }

    #[test]
    fn test_fatal_errors_exit_one() {
        let err = BootstrapError::NoIpv4Address {
            hostname: "launchlab".into(),
        };
        assert_eq!(exit_code(&Err(err)), 1);
    }

    #[test]
    fn test_summary_rows() {
        let lines = report_with(
            StageOutcome::Applied,
            StageOutcome::failed("x"),
            StageOutcome::failed("y"),
        )
        .summary()
        .lines();

        assert!(lines.iter().any(|l| l.contains("Tailscale IP:") && l.ends_with("100.64.0.5")));
        assert!(lines.iter().any(|l| l.contains("Subnet Routes:") && l.ends_with('✓')));
        assert!(lines.iter().any(|l| l.contains("Auto-Approvers:") && l.ends_with("⚠ (optional)")));
        assert!(lines.iter().any(|l| l.contains("DNS Config:") && l.contains("✗")));
        assert!(lines.iter().any(|l| l.contains("Device Found:") && l.ends_with("✓ (launchlab)")));
    }

    #[test]
    fn test_partial_dns_shows_as_failed_in_summary() {
        let lines = report_with(
            StageOutcome::Applied,
            StageOutcome::Applied,
            StageOutcome::partial("preferences"),
        )
        .summary()
        .lines();

        let dns = lines.iter().find(|l| l.contains("DNS Config:")).unwrap();
        assert!(dns.contains("✗ (nameserver: 172.20.0.4)"));
        assert!(!dns.contains('⚠'));
    }
}
