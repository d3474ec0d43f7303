// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Curator Fetch
//!
//! Remote API access for the curator.
//!
//! ## API
//!
//! - [`api::PublicationApi`] - The seam between the engine and the remote API
//! - [`twitter::TwitterClient`] - `reqwest` implementation of the v1.1 REST surface
//! - [`oauth`] - OAuth 1.0a request signing
//! - [`retry::RetryStrategy`] - Retries of transient failures
//!
//! ## Rate Limits
//!
//! - [`rate_limit::RateLimitGuard`] - Token selection and rotation
//! - [`backoff::BackoffScheduler`] - Interruptible waits while every token is frozen
//!
//! ## Example
//!
//! ```ignore
//! use curator_fetch::{RateLimitGuard, TwitterClient};
//!
//! let client = Arc::new(TwitterClient::with_defaults()?.with_consumer(key, secret));
//! let mut guard = RateLimitGuard::new(client, token_pool);
//!
//! if let Some(token) = guard.guard_against_limit(ApiEndpoint::UserTimeline).await? {
//!     // fetch with `token`
//! }
//! ```

pub mod api;
pub mod backoff;
pub mod error;
pub mod oauth;
pub mod rate_limit;
pub mod retry;
pub mod twitter;

// Errors
pub use error::{ApiError, HttpError};

// API
pub use api::{PublicationApi, timeline_endpoint};
pub use retry::RetryStrategy;
pub use twitter::TwitterClient;

// Rate limits
pub use backoff::{BackoffScheduler, WaitOutcome};
pub use rate_limit::RateLimitGuard;
