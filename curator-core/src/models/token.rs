//! Access token types.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default freeze window applied when the API does not report a reset time.
pub const DEFAULT_FREEZE_MINUTES: i64 = 15;

/// Number of access token characters that may appear in logs.
pub const TOKEN_PREFIX_LEN: usize = 8;

/// How requests made with a token are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// User context, signed with OAuth 1.0a.
    #[default]
    User,
    /// Application-only context, sent as a bearer token.
    Application,
}

/// An OAuth credential in the token pool.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Access token (or bearer token for application tokens).
    pub access_token: String,
    /// Access token secret.
    #[serde(default)]
    pub access_token_secret: String,
    /// Consumer key the token was issued for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_key: Option<String>,
    /// Consumer secret the token was issued for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_secret: Option<String>,
    /// Authentication context.
    #[serde(default)]
    pub kind: TokenKind,
    /// The token must not be used before this instant.
    #[serde(default)]
    pub frozen_until: Option<DateTime<Utc>>,
    /// When the token joined the pool.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl Token {
    /// Creates an unfrozen user token.
    pub fn new(access_token: impl Into<String>, access_token_secret: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
            consumer_key: None,
            consumer_secret: None,
            kind: TokenKind::User,
            frozen_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the consumer credentials.
    pub fn with_consumer(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.consumer_key = Some(key.into());
        self.consumer_secret = Some(secret.into());
        self
    }

    /// Sets the authentication context.
    pub fn with_kind(mut self, kind: TokenKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the freeze deadline.
    pub fn with_frozen_until(mut self, until: Option<DateTime<Utc>>) -> Self {
        self.frozen_until = until;
        self
    }

    /// Returns true if the token is frozen at `now`.
    pub fn is_frozen_at(&self, now: DateTime<Utc>) -> bool {
        self.frozen_until.is_some_and(|until| until > now)
    }

    /// Returns true if the token is frozen right now.
    pub fn is_frozen(&self) -> bool {
        self.is_frozen_at(Utc::now())
    }

    /// Returns true if the token can serve requests at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_frozen_at(now) && !self.access_token_secret.is_empty()
    }

    /// Seconds until the token unfreezes, zero if it is not frozen.
    pub fn seconds_until_unfrozen(&self, now: DateTime<Utc>) -> i64 {
        self.frozen_until
            .map_or(0, |until| (until - now).num_seconds().max(0))
    }

    /// Default freeze deadline computed from `now`.
    pub fn default_freeze_deadline(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::minutes(DEFAULT_FREEZE_MINUTES)
    }

    /// The loggable part of the access token.
    pub fn prefix(&self) -> &str {
        match self.access_token.char_indices().nth(TOKEN_PREFIX_LEN) {
            Some((end, _)) => &self.access_token[..end],
            None => &self.access_token,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &format_args!("{}…", self.prefix()))
            .field("access_token_secret", &"<redacted>")
            .field("consumer_key", &self.consumer_key.as_ref().map(|_| "<redacted>"))
            .field("kind", &self.kind)
            .field("frozen_until", &self.frozen_until)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_is_computed_from_now() {
        let now = Utc::now();
        let token = Token::new("aaaaaaaa-1", "secret")
            .with_frozen_until(Some(now + Duration::minutes(5)));

        assert!(token.is_frozen_at(now));
        assert!(!token.is_frozen_at(now + Duration::minutes(6)));
        assert_eq!(token.seconds_until_unfrozen(now), 300);
        assert_eq!(token.seconds_until_unfrozen(now + Duration::hours(1)), 0);
    }

    #[test]
    fn test_usable_requires_secret() {
        let now = Utc::now();
        assert!(Token::new("a", "s").is_usable_at(now));
        assert!(!Token::new("a", "").is_usable_at(now));
        let past = Token::new("a", "s").with_frozen_until(Some(now - Duration::seconds(1)));
        assert!(past.is_usable_at(now));
    }

    #[test]
    fn test_prefix() {
        assert_eq!(Token::new("1234567890abcdef", "s").prefix(), "12345678");
        assert_eq!(Token::new("short", "s").prefix(), "short");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = Token::new("1234567890abcdef", "very-secret").with_consumer("consumer-key-value", "consumer-secret-value");
        let debug = format!("{token:?}");
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("90abcdef"));
        assert!(!debug.contains("consumer-key-value"));
        assert!(!debug.contains("consumer-secret-value"));
        assert!(debug.contains("12345678"));
    }
}
