//! Logging setup
//!
//! Every agent logs timestamped lines to stdout. `RUST_LOG` overrides the
//! level picked by `--verbose`.

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Console output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logging flags shared by all agent binaries
#[derive(Debug, Clone, clap::Args)]
pub struct LogArgs {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl LogArgs {
    /// Install the global subscriber
    pub fn init(&self) -> Result<()> {
        init_logging(self.verbose, self.log_format)
    }
}

/// Install the global tracing subscriber.
pub fn init_logging(verbose: bool, format: LogFormat) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
    .context("Failed to install tracing subscriber")
}
