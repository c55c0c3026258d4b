//! WireGuard Client Bootstrap Agent
//!
//! Creates the default wg-easy VPN clients and saves their configs.
//!
//! # Usage
//! ```bash
//! WG_PASSWORD=... init-wg-easy
//! init-wg-easy --output-dir /srv/vpn/clients
//! ```
//!
//! Unlike the other agents a missing password is an error: wg-easy cannot
//! be driven without it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use launchlab_kit::outcome::banner;
use launchlab_kit::signal::until_interrupted;
use launchlab_kit::{LogArgs, ReadinessPoller};
use launchlab_services::wg_easy::{self, default_clients, WgEasyClient, DEFAULT_OUTPUT_DIR, DEFAULT_URL};
use tracing::{error, info, info_span, Instrument};

#[derive(Parser, Debug)]
#[command(name = "init-wg-easy")]
#[command(about = "Create default wg-easy VPN clients", long_about = None)]
#[command(version)]
struct Args {
    /// wg-easy web UI URL
    #[arg(long, env = "WG_URL", default_value = DEFAULT_URL)]
    url: String,

    /// wg-easy admin password
    #[arg(long, env = "WG_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Directory for client configs and QR codes
    #[arg(long, env = "OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = args.log.init() {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    let task = async move {
        execute(args).await.unwrap_or_else(|e| {
            error!("✗ {:#}", e);
            ExitCode::FAILURE
        })
    };
    until_interrupted(task).instrument(info_span!("wg-easy")).await
}

async fn execute(args: Args) -> Result<ExitCode> {
    banner("WireGuard Client Bootstrap");

    let Some(password) = args.password.filter(|p| !p.is_empty()) else {
        error!("✗ WG_PASSWORD environment variable not set");
        return Ok(ExitCode::FAILURE);
    };

    let mut client = WgEasyClient::new(&args.url).context("Failed to build HTTP client")?;
    let clients = default_clients();

    let report = wg_easy::run(
        &mut client,
        &ReadinessPoller::new("wg-easy"),
        &password,
        &clients,
        &args.output_dir,
    )
    .await?;

    report.summary().log();

    if report.is_success() {
        info!("✓ Created {}/{} clients", report.done(), report.clients.len());
        Ok(ExitCode::SUCCESS)
    } else {
        error!("✗ Created {}/{} clients", report.done(), report.clients.len());
        Ok(ExitCode::FAILURE)
    }
}
