// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Curator Core
//!
//! Core types, models, and collaborator traits for the curator.
//!
//! This crate provides the foundational abstractions used across all other
//! curator crates, including:
//!
//! - Domain models (publications, tokens, members, lists)
//! - Error types
//! - Collaborator traits implemented by the storage crate
//!
//! ## Key Types
//!
//! ### Publications
//! - [`PublicationId`] - Decimal big-integer id with numeric ordering
//! - [`Publication`] - A fetched item
//! - [`PublicationKind`] - Publications or likes
//!
//! ### Collection State
//! - [`Member`] - A curated account
//! - [`MemberExtremum`] - Ids already collected
//! - [`Whisperer`] - Account with nothing new to collect
//!
//! ### Requests
//! - [`CurationSelectors`] - What an attempt collects
//! - [`PageOptions`] - Bounds of one page
//! - [`FetchPublicationMessage`] - Work-queue message
//!
//! ### Credentials
//! - [`Token`] - OAuth token with its freeze deadline

pub mod error;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Publications
    Publication,
    PublicationId,
    PublicationKind,
    // Members
    Bound,
    IdWindow,
    Member,
    MemberAvailability,
    MemberExtremum,
    MemberProfile,
    Whisperer,
    // Requests
    CurationSelectors,
    FetchPublicationMessage,
    PageOptions,
    // Lists
    LockAttempt,
    PublishersList,
    // Tokens and limits
    ApiEndpoint,
    RateLimitStatus,
    Token,
    TokenKind,
    // Constants
    COLLECTION_LIMIT_MARGIN,
    DEFAULT_FREEZE_MINUTES,
    MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER,
    MAX_BATCH_SIZE,
    RECENTLY_CURATED_HOURS,
    TOKEN_PREFIX_LEN,
    WHISPERER_WINDOW_DAYS,
};

// Re-export traits
pub use traits::{PersistenceGateway, PublishersListRepository, TokenPool, WhispererRepository};
