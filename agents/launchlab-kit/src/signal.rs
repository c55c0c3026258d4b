//! Interrupt handling

use std::future::Future;
use std::process::ExitCode;

use tracing::{error, warn};

/// Drive `task` to completion unless Ctrl-C arrives first.
///
/// An interrupt becomes exit code 1. If the signal handler cannot be
/// installed the task simply runs to completion.
pub async fn until_interrupted<F>(task: F) -> ExitCode
where
    F: Future<Output = ExitCode>,
{
    tokio::pin!(task);

    let signal = tokio::select! {
        code = &mut task => return code,
        signal = tokio::signal::ctrl_c() => signal,
    };

    match signal {
        Ok(()) => {
            warn!("");
            warn!("✗ Interrupted by user");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl-C");
            task.await
        }
    }
}
