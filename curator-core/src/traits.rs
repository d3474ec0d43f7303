//! Collaborator traits.
//!
//! The curation engine talks to storage exclusively through these traits, so
//! the physical backend can be swapped without touching the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::models::{
    Bound, CurationSelectors, LockAttempt, Member, MemberAvailability, MemberExtremum,
    Publication, PublicationId, PublicationKind, PublishersList, Token, Whisperer,
};

// ============================================================================
// Token Pool
// ============================================================================

/// Shared pool of OAuth tokens.
///
/// Freezes must be visible to every worker as soon as `freeze` returns.
#[async_trait]
pub trait TokenPool: Send + Sync {
    /// Returns a usable token, if any.
    async fn find_first_unfrozen_token(&self) -> Result<Option<Token>, CoreError>;

    /// Returns the frozen token that unfreezes first, if any.
    async fn find_first_frozen_token(&self) -> Result<Option<Token>, CoreError>;

    /// Looks a token up by its access token.
    async fn find_by_access_token(&self, access_token: &str) -> Result<Option<Token>, CoreError>;

    /// Freezes a token until `until`.
    async fn freeze(&self, access_token: &str, until: DateTime<Utc>) -> Result<(), CoreError>;

    /// Freezes a token for the default window.
    async fn freeze_for_default_window(&self, access_token: &str) -> Result<(), CoreError> {
        self.freeze(access_token, Token::default_freeze_deadline(Utc::now()))
            .await
    }

    /// Clears the freeze of a token.
    async fn unfreeze(&self, access_token: &str) -> Result<(), CoreError>;

    /// Re-reads the pool and tells whether the token is frozen now.
    async fn is_frozen(&self, access_token: &str) -> Result<bool, CoreError> {
        Ok(self
            .find_by_access_token(access_token)
            .await?
            .is_some_and(|token| token.is_frozen()))
    }

    /// Adds a token unless it is already in the pool.
    async fn ensure_token(&self, token: Token) -> Result<Token, CoreError>;

    /// Lists every token.
    async fn tokens(&self) -> Result<Vec<Token>, CoreError>;

    /// Number of tokens in the pool.
    async fn count(&self) -> Result<usize, CoreError> {
        Ok(self.tokens().await?.len())
    }
}

// ============================================================================
// Persistence Gateway
// ============================================================================

/// Storage of publications and member collection state.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Saves the items of a page and returns how many were new.
    ///
    /// Saving is idempotent on publication id. Items published at or after
    /// the `before` cutoff of the selectors are skipped.
    async fn save(
        &self,
        items: &[Publication],
        screen_name: &str,
        selectors: &CurationSelectors,
    ) -> Result<usize, CoreError>;

    /// Number of items stored for a member timeline.
    async fn count_stored(&self, screen_name: &str, kind: PublicationKind)
    -> Result<u64, CoreError>;

    /// Looks a member up.
    async fn find_member(&self, screen_name: &str) -> Result<Option<Member>, CoreError>;

    /// Returns the member, creating a placeholder if missing.
    async fn ensure_member(&self, screen_name: &str) -> Result<Member, CoreError>;

    /// Collected id windows of a member.
    async fn extremum(&self, screen_name: &str) -> Result<Option<MemberExtremum>, CoreError> {
        Ok(self
            .find_member(screen_name)
            .await?
            .map(|member| member.extremum))
    }

    /// Widens one bound of a member window (compare-and-set).
    ///
    /// Fails with [`CoreError::MemberNotFound`] when the member is missing.
    async fn record_extremum(
        &self,
        screen_name: &str,
        kind: PublicationKind,
        bound: Bound,
        value: &PublicationId,
    ) -> Result<MemberExtremum, CoreError>;

    /// Last time an attempt finished for one timeline of the member.
    async fn last_curated_at(
        &self,
        screen_name: &str,
        kind: PublicationKind,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        Ok(self
            .find_member(screen_name)
            .await?
            .and_then(|member| member.curated_at(kind)))
    }

    /// Records that an attempt finished for one timeline of the member.
    async fn mark_curated(
        &self,
        screen_name: &str,
        kind: PublicationKind,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Known reachability of the member.
    async fn member_availability(&self, screen_name: &str) -> Result<MemberAvailability, CoreError> {
        Ok(self
            .find_member(screen_name)
            .await?
            .map(|member| member.availability)
            .unwrap_or_default())
    }

    /// Records that the member cannot be collected.
    async fn mark_member_unavailable(
        &self,
        screen_name: &str,
        availability: MemberAvailability,
    ) -> Result<(), CoreError>;
}

// ============================================================================
// Whisperers
// ============================================================================

/// Storage of declared whisperers.
#[async_trait]
pub trait WhispererRepository: Send + Sync {
    /// Looks a whisperer up.
    async fn find_whisperer(&self, screen_name: &str) -> Result<Option<Whisperer>, CoreError>;

    /// Declares (or re-declares) a whisperer.
    async fn declare_whisperer(&self, whisperer: Whisperer) -> Result<(), CoreError>;

    /// Forgets a whisperer.
    async fn forget_whisperer(&self, screen_name: &str) -> Result<(), CoreError>;
}

// ============================================================================
// Publishers Lists
// ============================================================================

/// Storage of publishers lists and their advisory locks.
#[async_trait]
pub trait PublishersListRepository: Send + Sync {
    /// Looks a list up.
    async fn find_list(&self, id: u64) -> Result<Option<PublishersList>, CoreError>;

    /// Creates or replaces a list.
    async fn save_list(&self, list: PublishersList) -> Result<(), CoreError>;

    /// Takes the lock of a list.
    async fn lock_list(&self, id: u64) -> Result<LockAttempt, CoreError>;

    /// Releases the lock of a list.
    async fn unlock_list(&self, id: u64) -> Result<(), CoreError>;
}
