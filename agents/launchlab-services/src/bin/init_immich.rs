//! Immich Admin Bootstrap Agent
//!
//! Waits for the Immich server and signs up the first admin account.
//!
//! # Usage
//! ```bash
//! ADMIN_PASSWORD=s3cret init-immich
//! init-immich --url http://localhost:2283 --email me@example.com
//! ```

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use launchlab_kit::outcome::banner;
use launchlab_kit::signal::until_interrupted;
use launchlab_kit::{LogArgs, ReadinessPoller, Summary};
use launchlab_services::immich::{self, AdminAccount, ImmichClient, DEFAULT_EMAIL, DEFAULT_NAME, DEFAULT_URL};
use launchlab_services::DEFAULT_ADMIN_PASSWORD;
use tracing::{error, info, info_span, Instrument};

#[derive(Parser, Debug)]
#[command(name = "init-immich")]
#[command(about = "Create the Immich admin account", long_about = None)]
#[command(version)]
struct Args {
    /// Immich server URL
    #[arg(long, env = "IMMICH_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Admin email address
    #[arg(long, env = "ADMIN_EMAIL", default_value = DEFAULT_EMAIL)]
    email: String,

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
    until_interrupted(task).instrument(info_span!("immich")).await
}

async fn execute(args: Args) -> Result<ExitCode> {
    banner("Immich Admin Bootstrap");

    let client = ImmichClient::new(&args.url).context("Failed to build HTTP client")?;
    let account = AdminAccount {
        email: args.email,
        password: args.password,
        name: DEFAULT_NAME.to_string(),
    };

    let outcome = immich::run(&client, &ReadinessPoller::new("Immich API"), &account).await?;

    Summary::new("Immich Setup Summary")
        .row("Admin Account", format!("{} ({})", outcome.mark(), account.email))
        .log();

    if outcome.is_success() {
        info!("✓ Immich initialization complete");
        Ok(ExitCode::SUCCESS)
    } else {
        error!("✗ Immich initialization failed");
        Ok(ExitCode::FAILURE)
    }
}
