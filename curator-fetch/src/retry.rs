//! Retry strategies for API requests.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ApiError;

/// Attempts made for one request before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Strategy for retrying failed requests.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Base delay between retries in seconds.
    pub base_delay_secs: u64,
    /// Whether to use exponential backoff.
    pub exponential_backoff: bool,
    /// Maximum delay between retries.
    pub max_delay_secs: u64,
}

impl RetryStrategy {
    /// Creates a new retry strategy.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_secs: 1,
            exponential_backoff: true,
            max_delay_secs: 60,
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_secs: 0,
            exponential_backoff: false,
            max_delay_secs: 0,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, secs: u64) -> Self {
        self.base_delay_secs = secs;
        self
    }

    /// Enables or disables exponential backoff.
    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Calculates the delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = if self.exponential_backoff {
            self.base_delay_secs
                .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        } else {
            self.base_delay_secs
        };

        Duration::from_secs(delay.min(self.max_delay_secs))
    }

    /// Determines if an error should be retried.
    pub fn should_retry(&self, error: &ApiError) -> bool {
        error.is_transient()
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Err(err) if attempt < self.max_attempts && self.should_retry(&err) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        endpoint = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "Transient API failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff() {
        let strategy = RetryStrategy::default();

        assert_eq!(strategy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(strategy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(strategy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(strategy.delay_for_attempt(4), Duration::from_secs(8));
    }

    #[test]
    fn test_max_delay_cap() {
        let strategy = RetryStrategy::new(10).with_base_delay(10);

        // Should be capped at 60 seconds
        assert_eq!(strategy.delay_for_attempt(5), Duration::from_secs(60));
        assert_eq!(strategy.delay_for_attempt(200), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_transient_errors_up_to_max() {
        let calls = AtomicU32::new(0);
        let strategy = RetryStrategy::default();

        let result: Result<(), ApiError> = strategy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::EmptyReply) }
            })
            .await;

        assert!(matches!(result, Err(ApiError::EmptyReply)));
        assert_eq!(calls.load(Ordering::SeqCst), DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let strategy = RetryStrategy::default();

        let result: Result<(), ApiError> = strategy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::Protected("pierrec".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(ApiError::Protected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_recovers_after_transient_error() {
        let calls = AtomicU32::new(0);
        let strategy = RetryStrategy::default();

        let result = strategy
            .run("test", || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(ApiError::OverCapacity {
                            code: Some(130),
                            message: "busy".to_string(),
                        })
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
    }
}
