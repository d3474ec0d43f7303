//! Domain models for the curator.
//!
//! ## Submodules
//!
//! - [`publication`] - Publication ids and fetched items
//! - [`token`] - OAuth tokens of the pool
//! - [`member`] - Members, id windows, profiles and whisperers
//! - [`selectors`] - Curation selectors, page options and queue messages
//! - [`list`] - Publishers lists
//! - [`rate_limit`] - Endpoints and rate limit status

pub mod list;
pub mod member;
pub mod publication;
pub mod rate_limit;
pub mod selectors;
pub mod token;

pub use list::{LockAttempt, PublishersList};
pub use member::{
    Bound, IdWindow, Member, MemberAvailability, MemberExtremum, MemberProfile, Whisperer,
    RECENTLY_CURATED_HOURS, WHISPERER_WINDOW_DAYS,
};
pub use publication::{Publication, PublicationId, PublicationKind};
pub use rate_limit::{ApiEndpoint, RateLimitStatus};
pub use selectors::{
    CurationSelectors, FetchPublicationMessage, PageOptions, COLLECTION_LIMIT_MARGIN,
    MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER, MAX_BATCH_SIZE,
};
pub use token::{Token, TokenKind, DEFAULT_FREEZE_MINUTES, TOKEN_PREFIX_LEN};

#[cfg(test)]
mod serde_tests;
