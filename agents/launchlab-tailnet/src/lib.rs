//! Tailnet Bootstrap Agent
//!
//! Brings a freshly deployed LaunchLab host into a usable tailnet state:
//!
//! 1. wait for the host's device to register with the control plane
//! 2. approve its advertised subnet routes
//! 3. add an auto-approver so future advertisements are enabled automatically
//! 4. point tailnet DNS at the local resolver and override local DNS
//!
//! Each stage after the wait is best-effort; see [`orchestrator`].

pub mod acl;
pub mod client;
pub mod config;
pub mod device;
pub mod dns;
pub mod orchestrator;
pub mod routes;

pub use client::{ApiError, TailnetClient};
pub use config::{ConfigError, TailnetConfig};
pub use orchestrator::{BootstrapError, RunReport};
