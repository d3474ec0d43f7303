//! Member types.
//!
//! - [`Member`] - A curated account and its collection state
//! - [`MemberExtremum`] - Min/max ids already collected per timeline
//! - [`MemberProfile`] - Remote profile counters
//! - [`Whisperer`] - An account that publishes little or nothing new

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::publication::{PublicationId, PublicationKind};

/// Rolling window in which a declared whisperer is taken into account.
pub const WHISPERER_WINDOW_DAYS: i64 = 30;

/// A member curated within this window is not curated again.
pub const RECENTLY_CURATED_HOURS: i64 = 7;

// ============================================================================
// Extremum
// ============================================================================

/// Which bound of an id window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// Oldest id collected.
    Min,
    /// Newest id collected.
    Max,
}

/// Inclusive id window of one timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdWindow {
    /// Oldest id collected.
    #[serde(default)]
    pub min: Option<PublicationId>,
    /// Newest id collected.
    #[serde(default)]
    pub max: Option<PublicationId>,
}

impl IdWindow {
    /// Returns the requested bound.
    pub fn bound(&self, bound: Bound) -> Option<&PublicationId> {
        match bound {
            Bound::Min => self.min.as_ref(),
            Bound::Max => self.max.as_ref(),
        }
    }

    /// Widens the window to include `value`.
    ///
    /// A min only ever decreases and a max only ever increases. Returns
    /// whether the window changed.
    pub fn widen(&mut self, bound: Bound, value: &PublicationId) -> bool {
        let slot = match bound {
            Bound::Min => &mut self.min,
            Bound::Max => &mut self.max,
        };
        let wider = match (bound, slot.as_ref()) {
            (_, None) => true,
            (Bound::Min, Some(current)) => value < current,
            (Bound::Max, Some(current)) => value > current,
        };
        if !wider {
            return false;
        }
        *slot = Some(value.clone());

        // Keep min <= max by dragging the opposite bound outwards.
        match bound {
            Bound::Min if self.max.as_ref().is_some_and(|max| max < value) => {
                self.max = Some(value.clone());
            }
            Bound::Max if self.min.as_ref().is_some_and(|min| min > value) => {
                self.min = Some(value.clone());
            }
            _ => {}
        }
        true
    }

    /// Returns true if both bounds are known.
    pub fn is_complete(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    /// Returns true if `[lowest, highest]` lies within the window.
    pub fn encloses(&self, lowest: &PublicationId, highest: &PublicationId) -> bool {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => min <= lowest && highest <= max,
            _ => false,
        }
    }
}

/// Ids already collected for a member, per timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberExtremum {
    /// Window of the member's own publications.
    #[serde(default)]
    pub statuses: IdWindow,
    /// Window of publications liked by the member.
    #[serde(default)]
    pub likes: IdWindow,
}

impl MemberExtremum {
    /// Window for a timeline.
    pub fn window(&self, kind: PublicationKind) -> &IdWindow {
        match kind {
            PublicationKind::Statuses => &self.statuses,
            PublicationKind::Likes => &self.likes,
        }
    }

    /// Mutable window for a timeline.
    pub fn window_mut(&mut self, kind: PublicationKind) -> &mut IdWindow {
        match kind {
            PublicationKind::Statuses => &mut self.statuses,
            PublicationKind::Likes => &mut self.likes,
        }
    }
}

// ============================================================================
// Member
// ============================================================================

/// Whether the remote account can be collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemberAvailability {
    /// Account is reachable.
    #[default]
    Available,
    /// Account has been suspended.
    Suspended,
    /// Account is protected.
    Protected,
    /// Account does not exist.
    NotFound,
}

impl MemberAvailability {
    /// Returns true unless the account is known to be unreachable.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Returns a short label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Suspended => "suspended",
            Self::Protected => "protected",
            Self::NotFound => "not found",
        }
    }
}

/// A curated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Screen name (unique).
    pub screen_name: String,
    /// Remote account id, unknown for placeholders.
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Collected id windows.
    #[serde(default)]
    pub extremum: MemberExtremum,
    /// Last time a curation attempt of the member's publications finished.
    #[serde(default)]
    pub last_curated_at: Option<DateTime<Utc>>,
    /// Last time a curation attempt of the member's likes finished.
    #[serde(default)]
    pub likes_curated_at: Option<DateTime<Utc>>,
    /// Reachability.
    #[serde(default)]
    pub availability: MemberAvailability,
    /// Created lazily while recording an extremum.
    #[serde(default)]
    pub placeholder: bool,
}

impl Member {
    /// Creates a member.
    pub fn new(screen_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            remote_id: None,
            extremum: MemberExtremum::default(),
            last_curated_at: None,
            likes_curated_at: None,
            availability: MemberAvailability::Available,
            placeholder: false,
        }
    }

    /// Creates a placeholder member named after a screen name.
    pub fn placeholder(screen_name: impl Into<String>) -> Self {
        Self {
            placeholder: true,
            ..Self::new(screen_name)
        }
    }

    /// Last time an attempt on a timeline finished.
    pub fn curated_at(&self, kind: PublicationKind) -> Option<DateTime<Utc>> {
        match kind {
            PublicationKind::Statuses => self.last_curated_at,
            PublicationKind::Likes => self.likes_curated_at,
        }
    }

    /// Records that an attempt on a timeline finished at `at`.
    pub fn set_curated_at(&mut self, kind: PublicationKind, at: DateTime<Utc>) {
        match kind {
            PublicationKind::Statuses => self.last_curated_at = Some(at),
            PublicationKind::Likes => self.likes_curated_at = Some(at),
        }
    }

    /// Returns true if the timeline was curated within `window` before `now`.
    pub fn curated_within(&self, kind: PublicationKind, now: DateTime<Utc>, window: Duration) -> bool {
        self.curated_at(kind)
            .is_some_and(|at| at <= now && now - at < window)
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Profile counters reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    /// Remote account id.
    #[serde(rename = "id_str")]
    pub remote_id: String,
    /// Screen name.
    pub screen_name: String,
    /// Number of publications.
    #[serde(default)]
    pub statuses_count: u64,
    /// Number of likes.
    #[serde(default)]
    pub favourites_count: u64,
    /// Whether the account is protected.
    #[serde(default)]
    pub protected: bool,
}

impl MemberProfile {
    /// Count reported for a timeline.
    pub fn count_for(&self, kind: PublicationKind) -> u64 {
        match kind {
            PublicationKind::Statuses => self.statuses_count,
            PublicationKind::Likes => self.favourites_count,
        }
    }
}

// ============================================================================
// Whisperer
// ============================================================================

/// A member whose timeline yielded nothing new on the last page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whisperer {
    /// Screen name.
    pub screen_name: String,
    /// Publication count reported by the profile.
    pub expected_whispers: u64,
    /// Publications stored when the whisperer was declared.
    pub collected_whispers: u64,
    /// When the whisperer was declared.
    pub declared_at: DateTime<Utc>,
}

impl Whisperer {
    /// Declares a whisperer now.
    pub fn new(screen_name: impl Into<String>, expected_whispers: u64, collected_whispers: u64) -> Self {
        Self {
            screen_name: screen_name.into(),
            expected_whispers,
            collected_whispers,
            declared_at: Utc::now(),
        }
    }

    /// Returns true if the declaration falls within `window` before `now`.
    pub fn is_recent_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.declared_at < window
    }
}
