//! Token selection under per-endpoint rate limits.
//!
//! A [`RateLimitGuard`] is owned by one curation attempt. It keeps track of
//! the active token, checks its remaining calls, and rotates through the
//! shared [`TokenPool`] when the active token is exhausted or rejected.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use curator_core::{ApiEndpoint, CoreError, DEFAULT_FREEZE_MINUTES, Token, TokenPool};
use tracing::{debug, info, instrument, warn};

use crate::api::PublicationApi;
use crate::error::ApiError;

// ============================================================================
// Check Outcome
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckOutcome {
    Available,
    Exhausted { reset_at: Option<DateTime<Utc>> },
    Failed,
}

// ============================================================================
// Rate Limit Guard
// ============================================================================

/// Picks a token with calls left for an endpoint.
pub struct RateLimitGuard {
    api: Arc<dyn PublicationApi>,
    tokens: Arc<dyn TokenPool>,
    active: Option<Token>,
    freeze_window: Duration,
}

impl RateLimitGuard {
    /// Creates a guard without an active token.
    pub fn new(api: Arc<dyn PublicationApi>, tokens: Arc<dyn TokenPool>) -> Self {
        Self {
            api,
            tokens,
            active: None,
            freeze_window: Duration::minutes(DEFAULT_FREEZE_MINUTES),
        }
    }

    /// Sets the freeze applied when no reset time is known.
    pub fn with_freeze_window(mut self, freeze_window: Duration) -> Self {
        self.freeze_window = freeze_window;
        self
    }

    /// Token used for the next request, if one was selected.
    pub fn active_token(&self) -> Option<&Token> {
        self.active.as_ref()
    }

    /// The shared token pool.
    pub fn token_pool(&self) -> &Arc<dyn TokenPool> {
        &self.tokens
    }

    async fn check_limit(&self, token: &Token, endpoint: ApiEndpoint) -> CheckOutcome {
        match self.api.check_rate_limit(token, endpoint).await {
            Ok(status) if status.is_nearly_exhausted() => {
                debug!(
                    token = token.prefix(),
                    endpoint = %endpoint,
                    limit = status.limit,
                    remaining = status.remaining,
                    "Token nearly exhausted"
                );
                CheckOutcome::Exhausted {
                    reset_at: status.reset_at,
                }
            }
            Ok(_) | Err(ApiError::EmptyReply) => CheckOutcome::Available,
            Err(err) if err.is_rate_limited() => CheckOutcome::Exhausted {
                reset_at: err.reset_at(),
            },
            Err(err) => {
                warn!(token = token.prefix(), endpoint = %endpoint, error = %err, "Rate limit check failed");
                CheckOutcome::Failed
            }
        }
    }

    async fn freeze_after_check(&self, token: &Token, outcome: CheckOutcome) -> Result<(), CoreError> {
        match outcome {
            CheckOutcome::Available => Ok(()),
            CheckOutcome::Exhausted { reset_at } => self.freeze_until(token, reset_at).await,
            CheckOutcome::Failed => self.freeze_for_window(token).await,
        }
    }

    async fn freeze_for_window(&self, token: &Token) -> Result<(), CoreError> {
        self.freeze_until(token, None).await
    }

    async fn freeze_until(&self, token: &Token, reset_at: Option<DateTime<Utc>>) -> Result<(), CoreError> {
        let now = Utc::now();
        let until = reset_at
            .filter(|reset| *reset > now)
            .unwrap_or(now + self.freeze_window);
        info!(token = token.prefix(), until = %until, "Freezing token");
        self.tokens.freeze(&token.access_token, until).await
    }

    /// Tells whether `token` may call `endpoint`.
    ///
    /// A check failing for another reason than the rate limit freezes the
    /// token for the freeze window.
    pub async fn is_available(&self, token: &Token, endpoint: ApiEndpoint) -> Result<bool, CoreError> {
        match self.check_limit(token, endpoint).await {
            CheckOutcome::Available => Ok(true),
            CheckOutcome::Exhausted { .. } => Ok(false),
            CheckOutcome::Failed => {
                self.freeze_for_window(token).await?;
                Ok(false)
            }
        }
    }

    /// Returns a token with calls left for `endpoint`, or `None` when every
    /// token is frozen or exhausted.
    ///
    /// Exhausted tokens met on the way are frozen until their window resets.
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    pub async fn guard_against_limit(&mut self, endpoint: ApiEndpoint) -> Result<Option<Token>, CoreError> {
        if let Some(active) = self.active.take() {
            if !self.tokens.is_frozen(&active.access_token).await? {
                let outcome = self.check_limit(&active, endpoint).await;
                if outcome == CheckOutcome::Available {
                    self.active = Some(active.clone());
                    return Ok(Some(active));
                }
                self.freeze_after_check(&active, outcome).await?;
            }
        }

        let pool_size = self.tokens.count().await?;
        for _ in 0..pool_size {
            let Some(candidate) = self.tokens.find_first_unfrozen_token().await? else {
                break;
            };

            let outcome = self.check_limit(&candidate, endpoint).await;
            if outcome == CheckOutcome::Available {
                debug!(token = candidate.prefix(), "Token selected");
                self.active = Some(candidate.clone());
                return Ok(Some(candidate));
            }
            self.freeze_after_check(&candidate, outcome).await?;
        }

        info!("No token available");
        Ok(None)
    }

    /// Freezes the active token after its credentials were rejected and
    /// activates another unfrozen token.
    pub async fn rotate_after_bad_authentication(&mut self) -> Result<Option<Token>, CoreError> {
        let Some(rejected) = self.active.take() else {
            return Ok(None);
        };
        warn!(token = rejected.prefix(), "Token rejected, rotating");
        self.freeze_for_window(&rejected).await?;

        let next = self
            .tokens
            .find_first_unfrozen_token()
            .await?
            .filter(|token| token.access_token != rejected.access_token);
        self.active.clone_from(&next);
        Ok(next)
    }

    /// Freezes the active token after a request hit the rate limit.
    pub async fn freeze_active(&mut self, reset_at: Option<DateTime<Utc>>) -> Result<(), CoreError> {
        if let Some(active) = self.active.take() {
            self.freeze_until(&active, reset_at).await?;
        }
        Ok(())
    }

    /// Seconds until the first frozen token unfreezes, with its prefix.
    pub async fn next_unfreeze(&self) -> Result<Option<(i64, String)>, CoreError> {
        let now = Utc::now();
        Ok(self
            .tokens
            .find_first_frozen_token()
            .await?
            .map(|token| (token.seconds_until_unfrozen(now), token.prefix().to_string())))
    }
}

// ============================================================================
// Tests
// ============================================================================
