//! Rate limit types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote endpoints the curator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiEndpoint {
    /// Publications of a member.
    UserTimeline,
    /// Publications liked by a member.
    Likes,
    /// Member profile.
    UserShow,
    /// Rate limit status of the token.
    RateLimitStatus,
}

impl ApiEndpoint {
    /// Request path, relative to the API base url.
    pub fn path(&self) -> &'static str {
        match self {
            Self::UserTimeline => "statuses/user_timeline.json",
            Self::Likes => "favorites/list.json",
            Self::UserShow => "users/show.json",
            Self::RateLimitStatus => "application/rate_limit_status.json",
        }
    }

    /// Resource family the endpoint is rate limited under.
    pub fn resource_family(&self) -> &'static str {
        match self {
            Self::UserTimeline => "statuses",
            Self::Likes => "favorites",
            Self::UserShow => "users",
            Self::RateLimitStatus => "application",
        }
    }

    /// Key of the endpoint in a rate limit status document.
    pub fn resource_key(&self) -> String {
        let path = self.path().trim_end_matches(".json");
        format!("/{path}")
    }
}

impl fmt::Display for ApiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Remaining calls for one endpoint and one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// Calls allowed per window.
    pub limit: u32,
    /// Calls left in the current window.
    pub remaining: u32,
    /// When the window resets.
    #[serde(default)]
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitStatus {
    /// Returns true once fewer than a tenth of the calls remain.
    pub fn is_nearly_exhausted(&self) -> bool {
        self.remaining < self.limit / 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearly_exhausted_threshold() {
        let status = |remaining| RateLimitStatus {
            limit: 900,
            remaining,
            reset_at: None,
        };
        assert!(status(89).is_nearly_exhausted());
        assert!(!status(90).is_nearly_exhausted());
        assert!(!status(900).is_nearly_exhausted());

        // floor(5 / 10) == 0, so a tiny limit never reports exhaustion.
        let tiny = RateLimitStatus {
            limit: 5,
            remaining: 0,
            reset_at: None,
        };
        assert!(!tiny.is_nearly_exhausted());
    }

    #[test]
    fn test_endpoint_resource_key() {
        assert_eq!(ApiEndpoint::UserTimeline.resource_key(), "/statuses/user_timeline");
        assert_eq!(ApiEndpoint::Likes.resource_family(), "favorites");
    }
}
