//! Work-queue message production.
//!
//! Expands a publishers list into one [`FetchPublicationMessage`] per member.

use std::collections::BTreeSet;
use std::sync::Arc;

use curator_core::{CurationSelectors, FetchPublicationMessage, PublishersListRepository};
use tracing::{debug, info};

use crate::error::EngineError;

/// Produces curation messages for the members of publishers lists.
#[derive(Clone)]
pub struct ListDispatcher {
    lists: Arc<dyn PublishersListRepository>,
}

impl ListDispatcher {
    /// Creates a dispatcher.
    pub fn new(lists: Arc<dyn PublishersListRepository>) -> Self {
        Self { lists }
    }

    /// One message per member of `list_id`, plus its owner when
    /// `template.include_owner()` is set.
    ///
    /// `template` carries the cutoff and the flags copied into every message.
    /// With `only`, members with another screen name are left out (ignoring
    /// case).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ListNotFound`] for an unknown list.
    pub async fn messages_for_list(
        &self,
        list_id: u64,
        template: &CurationSelectors,
        only: Option<&str>,
    ) -> Result<Vec<FetchPublicationMessage>, EngineError> {
        let list = self
            .lists
            .find_list(list_id)
            .await?
            .ok_or(EngineError::ListNotFound(list_id))?;

        let mut seen = BTreeSet::new();
        let owner = list
            .owner_screen_name
            .iter()
            .filter(|_| template.include_owner());

        let messages: Vec<_> = list
            .members
            .iter()
            .chain(owner)
            .map(|screen_name| screen_name.trim())
            .filter(|screen_name| !screen_name.is_empty())
            .filter(|screen_name| only.is_none_or(|only| only.eq_ignore_ascii_case(screen_name)))
            .filter(|screen_name| seen.insert(screen_name.to_ascii_lowercase()))
            .map(|screen_name| {
                let selectors = template.with_screen_name(screen_name).with_list(list_id);
                FetchPublicationMessage::from(&selectors)
            })
            .collect();

        debug!(list = list_id, members = list.members.len(), "Publishers list expanded");
        info!(list = list_id, name = %list.name, messages = messages.len(), "Dispatching curation messages");
        Ok(messages)
    }
}
