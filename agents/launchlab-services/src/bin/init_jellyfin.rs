//! Jellyfin Startup Wizard Agent
//!
//! Completes the Jellyfin first-start wizard so the server is usable
//! without opening the web UI. Individual wizard failures are logged and
//! do not change the exit code.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use launchlab_kit::outcome::banner;
use launchlab_kit::signal::until_interrupted;
use launchlab_kit::{LogArgs, ReadinessPoller};
use launchlab_services::jellyfin::{self, JellyfinClient, DEFAULT_URL};
use launchlab_services::{AdminCredentials, DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USER};
use tracing::{error, info, info_span, Instrument};

#[derive(Parser, Debug)]
#[command(name = "init-jellyfin")]
#[command(about = "Run the Jellyfin startup wizard", long_about = None)]
#[command(version)]
struct Args {
    /// Jellyfin server URL
    #[arg(long, env = "JELLYFIN_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Admin username
    #[arg(long, env = "ADMIN_USER", default_value = DEFAULT_ADMIN_USER)]
    username: String,

    /// Admin password
    #[arg(long, env = "ADMIN_PASSWORD", default_value = DEFAULT_ADMIN_PASSWORD, hide_env_values = true)]
    password: String,

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
    until_interrupted(task).instrument(info_span!("jellyfin")).await
}

async fn execute(args: Args) -> Result<ExitCode> {
    banner("Jellyfin Startup Wizard");

    let client = JellyfinClient::new(&args.url).context("Failed to build HTTP client")?;
    let creds = AdminCredentials::new(args.username, args.password);

    let report = jellyfin::run(&client, &ReadinessPoller::new("Jellyfin API"), &creds).await?;
    report.summary().log();

    info!("✓ Jellyfin initialization complete");
    Ok(ExitCode::SUCCESS)
}
