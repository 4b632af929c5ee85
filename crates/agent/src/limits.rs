//! Run-level limits enforced from outside the run.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancels a run token once the run has been going for too long.
///
/// The watchdog stops when dropped, so it lives exactly as long as the run
/// that armed it.
#[derive(Debug)]
pub struct RunWatchdog {
    handle: JoinHandle<()>,
}

impl RunWatchdog {
    /// Arm a watchdog for `limit`. `None` means no limit.
    pub fn arm(limit: Option<Duration>, cancel: &CancellationToken) -> Option<Self> {
        let limit = limit?;
        let cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(limit) => {
                    warn!(timeout_secs = limit.as_secs(), "Run exceeded its time limit, cancelling");
                    cancel.cancel();
                }
            }
        });
        Some(Self { handle })
    }
}

impl Drop for RunWatchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
