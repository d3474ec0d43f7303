//! Extremum tracking.
//!
//! Turns the id window stored for a member into the bounds of the next page,
//! and widens that window once a page is fetched.

use std::sync::Arc;

use curator_core::{
    Bound, CoreError, CurationSelectors, IdWindow, MemberExtremum, PageOptions,
    PersistenceGateway, Publication, PublicationKind,
};
use tracing::{debug, error};

use crate::error::EngineError;

/// Attempts at recording an extremum before giving up.
pub const MAX_EXTREMUM_ATTEMPTS: u32 = 3;

/// Bounds the next page from a stored id window.
///
/// Going backward requests items below the stored minimum, going forward
/// items above the stored maximum. Without a stored bound the page stays
/// unbounded.
pub fn next_page_options(window: &IdWindow, options: PageOptions, discover_with_max_id: bool) -> PageOptions {
    let mut options = options;
    options.max_id = None;
    options.since_id = None;

    if discover_with_max_id {
        if let Some(min) = &window.min {
            // Nothing lies below id zero, keep the page pinned on it.
            let below = min.predecessor().unwrap_or_else(|| min.clone());
            return options.with_max_id(below);
        }
    } else if let Some(max) = &window.max {
        return options.with_since_id(max.successor());
    }
    options
}

/// Reads and widens member id windows through the persistence gateway.
#[derive(Clone)]
pub struct ExtremumTracker {
    gateway: Arc<dyn PersistenceGateway>,
}

impl ExtremumTracker {
    /// Creates a tracker.
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Stored window of the timeline selected by `selectors`.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    pub async fn window(&self, selectors: &CurationSelectors) -> Result<IdWindow, EngineError> {
        Ok(self
            .gateway
            .extremum(selectors.screen_name())
            .await?
            .map(|extremum| extremum.window(selectors.kind()).clone())
            .unwrap_or_default())
    }

    /// Bounds `options` for the next page.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    pub async fn update_extremum(
        &self,
        selectors: &CurationSelectors,
        options: PageOptions,
        discover_with_max_id: bool,
    ) -> Result<PageOptions, EngineError> {
        let window = self.window(selectors).await?;
        let options = next_page_options(&window, options, discover_with_max_id);
        debug!(
            screen_name = selectors.screen_name(),
            kind = %selectors.kind(),
            max_id = ?options.max_id,
            since_id = ?options.since_id,
            "Page bounded"
        );
        Ok(options)
    }

    /// Widens the stored window with a newest-first batch.
    ///
    /// The maximum comes from the first item, the minimum from the last one.
    /// Returns `None` for an empty batch.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExtremumRetriesExhausted`] if the member record
    /// keeps missing, or any store error.
    pub async fn declare_extremum(
        &self,
        screen_name: &str,
        kind: PublicationKind,
        batch: &[Publication],
        direction_is_max: bool,
    ) -> Result<Option<MemberExtremum>, EngineError> {
        let item = if direction_is_max { batch.first() } else { batch.last() };
        let Some(item) = item else {
            return Ok(None);
        };
        let bound = if direction_is_max { Bound::Max } else { Bound::Min };

        let mut attempts = 0;
        while attempts < MAX_EXTREMUM_ATTEMPTS {
            attempts += 1;
            match self
                .gateway
                .record_extremum(screen_name, kind, bound, &item.id)
                .await
            {
                Ok(extremum) => return Ok(Some(extremum)),
                Err(CoreError::MemberNotFound(_)) => {
                    debug!(screen_name, attempt = attempts, "Member missing, creating placeholder");
                    self.gateway.ensure_member(screen_name).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        error!(screen_name, attempts, "Extremum could not be recorded");
        Err(EngineError::ExtremumRetriesExhausted {
            screen_name: screen_name.to_string(),
            attempts,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
