//! The remote API seam.

use async_trait::async_trait;
use curator_core::{
    ApiEndpoint, CurationSelectors, MemberProfile, PageOptions, Publication, RateLimitStatus,
    Token,
};

use crate::error::ApiError;

/// Calls the curator makes against the remote API.
#[async_trait]
pub trait PublicationApi: Send + Sync {
    /// Fetches one page of the timeline selected by `selectors`, newest first.
    async fn fetch_page(
        &self,
        token: &Token,
        selectors: &CurationSelectors,
        options: &PageOptions,
    ) -> Result<Vec<Publication>, ApiError>;

    /// Reads the rate limit status of `token` for `endpoint`.
    async fn check_rate_limit(
        &self,
        token: &Token,
        endpoint: ApiEndpoint,
    ) -> Result<RateLimitStatus, ApiError>;

    /// Fetches the profile of a member.
    async fn fetch_member_profile(
        &self,
        token: &Token,
        screen_name: &str,
    ) -> Result<MemberProfile, ApiError>;
}

/// Endpoint serving the timeline selected by `selectors`.
pub fn timeline_endpoint(selectors: &CurationSelectors) -> ApiEndpoint {
    if selectors.fetch_likes() {
        ApiEndpoint::Likes
    } else {
        ApiEndpoint::UserTimeline
    }
}
