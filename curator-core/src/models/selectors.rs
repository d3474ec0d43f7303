//! Curation selectors, pagination options and work-queue messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::publication::{PublicationId, PublicationKind};

/// Maximum number of items the API returns per page.
pub const MAX_BATCH_SIZE: usize = 200;

/// Maximum number of items the API exposes per member timeline.
pub const MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER: u64 = 3200;

/// Margin below the platform cap at which backward discovery stops.
pub const COLLECTION_LIMIT_MARGIN: u64 = 100;

// ============================================================================
// Curation Selectors
// ============================================================================

/// Describes what a curation attempt collects.
///
/// Selectors are never mutated in place; derived selectors are built with the
/// `with_*` and `without_*` methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurationSelectors {
    screen_name: String,
    #[serde(default)]
    before: Option<DateTime<Utc>>,
    #[serde(default)]
    list_id: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    fetch_likes: bool,
    #[serde(default)]
    ignore_whisperers: bool,
    #[serde(default)]
    include_owner: bool,
}

impl CurationSelectors {
    /// Selects the publications of a member.
    pub fn new(screen_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            before: None,
            list_id: None,
            cursor: None,
            fetch_likes: false,
            ignore_whisperers: false,
            include_owner: false,
        }
    }

    /// Member screen name.
    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }

    /// Items published at or after this instant are not saved.
    pub fn before(&self) -> Option<DateTime<Utc>> {
        self.before
    }

    /// Publishers list the member was dispatched from.
    pub fn list_id(&self) -> Option<u64> {
        self.list_id
    }

    /// Opaque resume cursor.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Whether likes are collected instead of publications.
    pub fn fetch_likes(&self) -> bool {
        self.fetch_likes
    }

    /// Whether whisperer suppression is bypassed.
    pub fn ignore_whisperers(&self) -> bool {
        self.ignore_whisperers
    }

    /// Whether the list owner is curated too.
    pub fn include_owner(&self) -> bool {
        self.include_owner
    }

    /// Timeline selected.
    pub fn kind(&self) -> PublicationKind {
        if self.fetch_likes {
            PublicationKind::Likes
        } else {
            PublicationKind::Statuses
        }
    }

    /// Selects another member, keeping everything else.
    pub fn with_screen_name(&self, screen_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            ..self.clone()
        }
    }

    /// Sets the `before` cutoff.
    pub fn with_before(&self, before: DateTime<Utc>) -> Self {
        Self {
            before: Some(before),
            ..self.clone()
        }
    }

    /// Clears the `before` cutoff.
    pub fn without_before(&self) -> Self {
        Self {
            before: None,
            ..self.clone()
        }
    }

    /// Sets the publishers list.
    pub fn with_list(&self, list_id: u64) -> Self {
        Self {
            list_id: Some(list_id),
            ..self.clone()
        }
    }

    /// Clears the publishers list.
    pub fn without_list(&self) -> Self {
        Self {
            list_id: None,
            ..self.clone()
        }
    }

    /// Sets the resume cursor.
    pub fn with_cursor(&self, cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            ..self.clone()
        }
    }

    /// Selects likes or publications.
    pub fn with_likes(&self, fetch_likes: bool) -> Self {
        Self {
            fetch_likes,
            ..self.clone()
        }
    }

    /// Bypasses whisperer suppression or not.
    pub fn with_ignore_whisperers(&self, ignore_whisperers: bool) -> Self {
        Self {
            ignore_whisperers,
            ..self.clone()
        }
    }

    /// Includes the list owner or not.
    pub fn with_include_owner(&self, include_owner: bool) -> Self {
        Self {
            include_owner,
            ..self.clone()
        }
    }
}

// ============================================================================
// Page Options
// ============================================================================

/// Options of one page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOptions {
    /// Page size, at most [`MAX_BATCH_SIZE`].
    pub count: usize,
    /// Only items with an id lower than or equal to this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_id: Option<PublicationId>,
    /// Only items with an id greater than this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_id: Option<PublicationId>,
}

impl PageOptions {
    /// A page without id bounds.
    pub fn unbounded(count: usize) -> Self {
        Self {
            count: count.min(MAX_BATCH_SIZE),
            max_id: None,
            since_id: None,
        }
    }

    /// Sets the upper bound.
    pub fn with_max_id(mut self, max_id: PublicationId) -> Self {
        self.max_id = Some(max_id);
        self
    }

    /// Sets the lower bound.
    pub fn with_since_id(mut self, since_id: PublicationId) -> Self {
        self.since_id = Some(since_id);
        self
    }

    /// Returns true if neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.max_id.is_none() && self.since_id.is_none()
    }

    /// Returns true if the page reaches items published after the last fetch.
    pub fn reaches_past_last_fetch(&self) -> bool {
        self.since_id.is_some() || self.is_unbounded()
    }
}

impl Default for PageOptions {
    fn default() -> Self {
        Self::unbounded(MAX_BATCH_SIZE)
    }
}

// ============================================================================
// Work-queue Message
// ============================================================================

/// Work-queue message requesting a curation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPublicationMessage {
    /// Member screen name.
    pub screen_name: String,
    /// Publishers list id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<u64>,
    /// Cutoff date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,
    /// Resume cursor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Collect likes instead of publications.
    #[serde(default)]
    pub fetch_likes: bool,
    /// Curate the list owner too.
    #[serde(default)]
    pub include_owner: bool,
    /// Bypass whisperer suppression.
    #[serde(default)]
    pub ignore_whisperers: bool,
}

impl From<&CurationSelectors> for FetchPublicationMessage {
    fn from(selectors: &CurationSelectors) -> Self {
        Self {
            screen_name: selectors.screen_name.clone(),
            list_id: selectors.list_id,
            before: selectors.before,
            cursor: selectors.cursor.clone(),
            fetch_likes: selectors.fetch_likes,
            include_owner: selectors.include_owner,
            ignore_whisperers: selectors.ignore_whisperers,
        }
    }
}

impl From<FetchPublicationMessage> for CurationSelectors {
    fn from(message: FetchPublicationMessage) -> Self {
        Self {
            screen_name: message.screen_name,
            before: message.before,
            list_id: message.list_id,
            cursor: message.cursor,
            fetch_likes: message.fetch_likes,
            ignore_whisperers: message.ignore_whisperers,
            include_owner: message.include_owner,
        }
    }
}
