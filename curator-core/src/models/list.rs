//! Publishers list types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named list of members curated together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishersList {
    /// List id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Screen name of the owner.
    #[serde(default)]
    pub owner_screen_name: Option<String>,
    /// Screen names of the members.
    #[serde(default)]
    pub members: Vec<String>,
    /// Whether a curation attempt holds the list.
    #[serde(default)]
    pub locked: bool,
    /// Last lock time.
    #[serde(default)]
    pub locked_at: Option<DateTime<Utc>>,
    /// Last unlock time.
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl PublishersList {
    /// Creates an unlocked list without members.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner_screen_name: None,
            members: Vec::new(),
            locked: false,
            locked_at: None,
            unlocked_at: None,
        }
    }

    /// Sets the owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_screen_name = Some(owner.into());
        self
    }

    /// Sets the members.
    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    /// Takes the lock. Returns false if it was already held.
    pub fn lock(&mut self, now: DateTime<Utc>) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        self.locked_at = Some(now);
        true
    }

    /// Releases the lock.
    pub fn unlock(&mut self, now: DateTime<Utc>) {
        self.locked = false;
        self.unlocked_at = Some(now);
    }
}

/// Result of trying to lock a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAttempt {
    /// The caller now holds the lock.
    Acquired,
    /// Someone else holds the lock.
    AlreadyLocked,
    /// No list has this id.
    NotFound,
}
