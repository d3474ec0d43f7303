//! Interruptible waits while every token is frozen.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration elapsed.
    Elapsed,
    /// The wait was cancelled early.
    Cancelled,
}

/// Formats a wait for operators.
pub fn describe_wait(seconds: u64) -> String {
    if seconds < 60 {
        format!("{seconds} more seconds")
    } else {
        format!("{} more minutes", seconds / 60)
    }
}

/// Single suspension point of the curation engine.
#[derive(Debug, Clone, Default)]
pub struct BackoffScheduler {
    cancel: CancellationToken,
}

impl BackoffScheduler {
    /// Creates a scheduler interrupted by `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// The cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits `seconds` (negative values clamp to zero) unless cancelled.
    pub async fn wait_for(&self, seconds: i64, token_prefix: &str) -> WaitOutcome {
        let seconds = u64::try_from(seconds).unwrap_or(0);
        info!(
            token = token_prefix,
            wait = %describe_wait(seconds),
            "Waiting for a token to unfreeze"
        );

        if self.cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        if seconds == 0 {
            return WaitOutcome::Elapsed;
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(token = token_prefix, "Wait cancelled");
                WaitOutcome::Cancelled
            }
            () = tokio::time::sleep(Duration::from_secs(seconds)) => WaitOutcome::Elapsed,
        }
    }
}
