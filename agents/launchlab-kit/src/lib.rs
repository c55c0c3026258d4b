//! LaunchLab Bootstrap Kit
//!
//! Pieces shared by every first-boot agent:
//!
//! - `readiness`: poll a service until its API answers
//! - `outcome`: per-stage results and the end-of-run summary table
//! - `logging` / `http`: subscriber and HTTP client setup
//! - `signal`: turn Ctrl-C into a clean failing exit

pub mod http;
pub mod logging;
pub mod outcome;
pub mod readiness;
pub mod signal;

pub use logging::{LogArgs, LogFormat};
pub use outcome::{StageOutcome, Summary};
pub use readiness::{PollOutcome, ReadinessError, ReadinessPoller};
