//! Portainer Admin Bootstrap Agent
//!
//! Creates the initial Portainer admin unless one already exists.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use launchlab_kit::outcome::banner;
use launchlab_kit::signal::until_interrupted;
use launchlab_kit::{LogArgs, ReadinessPoller, Summary};
use launchlab_services::portainer::{self, PortainerClient, DEFAULT_URL};
use launchlab_services::{AdminCredentials, DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USER};
use tracing::{error, info, info_span, Instrument};

#[derive(Parser, Debug)]
#[command(name = "init-portainer")]
#[command(about = "Create the Portainer admin account", long_about = None)]
#[command(version)]
struct Args {
    /// Portainer URL
    #[arg(long, env = "PORTAINER_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Admin username
    #[arg(long, env = "ADMIN_USER", default_value = DEFAULT_ADMIN_USER)]
    username: String,

    /// Admin password (Portainer requires at least 12 characters)
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
    until_interrupted(task).instrument(info_span!("portainer")).await
}

async fn execute(args: Args) -> Result<ExitCode> {
    banner("Portainer Admin Bootstrap");

    let client = PortainerClient::new(&args.url).context("Failed to build HTTP client")?;
    let creds = AdminCredentials::new(args.username, args.password);

    let outcome = portainer::run(&client, &ReadinessPoller::new("Portainer API"), &creds).await?;

    Summary::new("Portainer Setup Summary")
        .row("Admin Account", format!("{} ({})", outcome.mark(), creds.username))
        .log();

    if outcome.is_success() {
        info!("✓ Portainer initialization complete");
        Ok(ExitCode::SUCCESS)
    } else {
        error!("✗ Portainer initialization failed");
        Ok(ExitCode::FAILURE)
    }
}
