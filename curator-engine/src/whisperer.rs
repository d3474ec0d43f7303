//! Whisperer detection.
//!
//! A whisperer is a member whose timeline returned nothing new. Once the
//! stored count matches the count reported by their profile, curating them
//! again is skipped for a while. Only the member's own publications are
//! tracked; likes are always curated.

use std::sync::Arc;

use chrono::{Duration, Utc};
use curator_core::{
    CurationSelectors, MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER, PersistenceGateway, PublicationKind,
    Token, WHISPERER_WINDOW_DAYS, Whisperer, WhispererRepository,
};
use curator_fetch::PublicationApi;
use tracing::{debug, info, instrument};

use crate::error::EngineError;

/// Declares and recognizes whisperers.
#[derive(Clone)]
pub struct WhispererDetector {
    api: Arc<dyn PublicationApi>,
    gateway: Arc<dyn PersistenceGateway>,
    whisperers: Arc<dyn WhispererRepository>,
    window: Duration,
}

impl WhispererDetector {
    /// Creates a detector honouring declarations for 30 days.
    pub fn new(
        api: Arc<dyn PublicationApi>,
        gateway: Arc<dyn PersistenceGateway>,
        whisperers: Arc<dyn WhispererRepository>,
    ) -> Self {
        Self {
            api,
            gateway,
            whisperers,
            window: Duration::days(WHISPERER_WINDOW_DAYS),
        }
    }

    /// Sets how long a declaration is honoured.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Returns true if whisperers are tracked for the selected timeline.
    pub fn applies_to(selectors: &CurationSelectors) -> bool {
        selectors.kind() == PublicationKind::Statuses
    }

    /// Declares the member a whisperer when the last page was empty.
    ///
    /// Returns false without any call when the page had items or likes are
    /// selected.
    ///
    /// # Errors
    ///
    /// Returns error if the profile cannot be fetched or the declaration
    /// cannot be stored.
    #[instrument(skip(self, token, selectors), fields(screen_name = selectors.screen_name()))]
    pub async fn identify_whisperer(
        &self,
        token: &Token,
        selectors: &CurationSelectors,
        last_batch_size: usize,
    ) -> Result<bool, EngineError> {
        if last_batch_size > 0 || !Self::applies_to(selectors) {
            return Ok(false);
        }

        let screen_name = selectors.screen_name();
        let kind = selectors.kind();
        let profile = self.api.fetch_member_profile(token, screen_name).await?;
        let expected = profile.count_for(kind);
        let stored = self.gateway.count_stored(screen_name, kind).await?;

        info!(
            screen_name,
            kind = %kind,
            stored,
            expected,
            "{stored} of {expected} {} collected",
            kind.label()
        );

        self.whisperers
            .declare_whisperer(Whisperer::new(screen_name, expected, stored))
            .await?;
        Ok(true)
    }

    /// Tells whether curating the member can be skipped. Makes no remote call.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    pub async fn should_skip(&self, selectors: &CurationSelectors) -> Result<bool, EngineError> {
        if !Self::applies_to(selectors) {
            return Ok(false);
        }
        let screen_name = selectors.screen_name();
        let Some(whisperer) = self.whisperers.find_whisperer(screen_name).await? else {
            return Ok(false);
        };
        if !whisperer.is_recent_at(Utc::now(), self.window) {
            return Ok(false);
        }

        let stored = self.gateway.count_stored(screen_name, selectors.kind()).await?;
        if whisperer.expected_whispers >= MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER
            && stored < MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER
        {
            debug!(screen_name, stored, "More to collect below the platform cap");
            return Ok(false);
        }

        let skip = stored == whisperer.expected_whispers;
        if skip {
            info!(screen_name, stored, "Skipping whisperer");
        }
        Ok(skip)
    }
}
