//! Tailscale Automation Agent
//!
//! Approves the LaunchLab host's subnet routes and points tailnet DNS at the
//! local resolver, so the tailnet works without visiting the admin console.
//!
//! # Usage
//! ```bash
//! TAILSCALE_API_TOKEN=tskey-api-... TAILSCALE_TAILNET=example.com init-tailscale
//!
//! # Different host and resolver
//! init-tailscale --hostname homelab --nameserver 172.20.0.53
//! ```
//!
//! Missing token or tailnet skips the run with exit code 0.

use std::process::ExitCode;

use clap::Parser;
use launchlab_kit::outcome::banner;
use launchlab_kit::signal::until_interrupted;
use launchlab_kit::LogArgs;
use launchlab_tailnet::client::TAILSCALE_API;
use launchlab_tailnet::config::{DEFAULT_HOSTNAME, DEFAULT_NAMESERVER, DEFAULT_SUBNET};
use launchlab_tailnet::orchestrator::{self, exit_code};
use launchlab_tailnet::TailnetConfig;
use tracing::{info, info_span, warn, Instrument};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser, Debug)]
#[command(name = "init-tailscale")]
#[command(about = "Approve subnet routes and configure DNS for a LaunchLab tailnet", long_about = None)]
#[command(version)]
struct Args {
    /// API access token
    #[arg(long, env = "TAILSCALE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Tailnet name (e.g. example.com or an organization name)
    #[arg(long, env = "TAILSCALE_TAILNET")]
    tailnet: Option<String>,

    /// Hostname of the device advertising the subnet
    #[arg(long, env = "TAILSCALE_HOSTNAME", default_value = DEFAULT_HOSTNAME)]
    hostname: String,

    /// Subnet to approve and auto-approve
    #[arg(long, env = "DOCKER_SUBNET", default_value = DEFAULT_SUBNET)]
    subnet: String,

    /// Global nameserver (the resolver's subnet IP)
    #[arg(long, env = "PIHOLE_IP", default_value = DEFAULT_NAMESERVER)]
    nameserver: String,

    /// Control-plane API root
    #[arg(long, env = "TAILSCALE_API_BASE", default_value = TAILSCALE_API)]
    api_base: String,

    /// Seconds to wait for the device to register (one probe per second)
    #[arg(long, env = "DEVICE_WAIT_ATTEMPTS", default_value_t = 120)]
    wait_attempts: u32,

    #[command(flatten)]
    log: LogArgs,
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = args.log.init() {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    until_interrupted(execute(args))
        .instrument(info_span!("tailscale"))
        .await
}

async fn execute(args: Args) -> ExitCode {
    banner("Tailscale Automation");

    let config = match TailnetConfig::new(args.api_token, args.tailnet) {
        Ok(config) => config
            .hostname(args.hostname)
            .subnet(args.subnet)
            .nameserver(args.nameserver)
            .api_base(args.api_base)
            .wait_attempts(args.wait_attempts),
        Err(e) => {
            warn!("✗ {}", e);
            info!("Skipping automation. Manual configuration required.");
            return ExitCode::SUCCESS;
        }
    };

    let result = orchestrator::run(&config).await;
    orchestrator::report(&result, &config);

    ExitCode::from(exit_code(&result))
}
