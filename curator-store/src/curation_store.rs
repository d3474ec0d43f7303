//! JSON-backed curation state.
//!
//! Holds members with their id windows, stored publications, whisperers and
//! publishers lists. Implements every storage trait the engine needs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curator_core::{
    Bound, CoreError, CurationSelectors, LockAttempt, Member, MemberAvailability, MemberExtremum,
    PersistenceGateway, Publication, PublicationId, PublicationKind, PublishersList,
    PublishersListRepository, Whisperer, WhispererRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::persistence::{Change, SharedJson};

// ============================================================================
// State
// ============================================================================

/// Publications stored for one member, per timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTimelines {
    #[serde(default)]
    statuses: BTreeMap<PublicationId, Publication>,
    #[serde(default)]
    likes: BTreeMap<PublicationId, Publication>,
}

impl StoredTimelines {
    fn timeline(&self, kind: PublicationKind) -> &BTreeMap<PublicationId, Publication> {
        match kind {
            PublicationKind::Statuses => &self.statuses,
            PublicationKind::Likes => &self.likes,
        }
    }

    fn timeline_mut(&mut self, kind: PublicationKind) -> &mut BTreeMap<PublicationId, Publication> {
        match kind {
            PublicationKind::Statuses => &mut self.statuses,
            PublicationKind::Likes => &mut self.likes,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CurationState {
    #[serde(default)]
    members: BTreeMap<String, Member>,
    #[serde(default)]
    publications: BTreeMap<String, StoredTimelines>,
    #[serde(default)]
    whisperers: BTreeMap<String, Whisperer>,
    #[serde(default)]
    lists: BTreeMap<u64, PublishersList>,
}

// ============================================================================
// Curation Store
// ============================================================================

/// Curation state shared by every attempt.
///
/// Each update runs under the file lock from reload to write, so
/// compare-and-set updates never interleave, even across processes.
#[derive(Clone)]
pub struct CurationStore {
    state: SharedJson<CurationState>,
}

impl Default for CurationStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl CurationStore {
    /// Creates an empty in-memory store.
    pub fn in_memory() -> Self {
        Self {
            state: SharedJson::in_memory(CurationState::default()),
        }
    }

    /// Opens the state stored at `path` (empty if the file does not exist).
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let state = SharedJson::open(path).await?;
        let (members, lists) = state
            .read(|state: &CurationState| (state.members.len(), state.lists.len()))
            .await?;
        if let Some(path) = state.path() {
            info!(path = %path.display(), members, lists, "Loaded curation state");
        }
        Ok(Self { state })
    }

    /// Lists every member.
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be read.
    pub async fn members(&self) -> Result<Vec<Member>, StoreError> {
        self.state
            .read(|state| state.members.values().cloned().collect())
            .await
    }

    /// Lists every publishers list.
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be read.
    pub async fn lists(&self) -> Result<Vec<PublishersList>, StoreError> {
        self.state
            .read(|state| state.lists.values().cloned().collect())
            .await
    }

    /// Stored publications of a member timeline, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be read.
    pub async fn publications(
        &self,
        screen_name: &str,
        kind: PublicationKind,
    ) -> Result<Vec<Publication>, StoreError> {
        self.state
            .read(|state| {
                state
                    .publications
                    .get(screen_name)
                    .map(|stored| stored.timeline(kind).values().rev().cloned().collect())
                    .unwrap_or_default()
            })
            .await
    }
}

// ============================================================================
// PersistenceGateway
// ============================================================================

#[async_trait]
impl PersistenceGateway for CurationStore {
    #[instrument(skip(self, items, selectors), fields(items = items.len()))]
    async fn save(
        &self,
        items: &[Publication],
        screen_name: &str,
        selectors: &CurationSelectors,
    ) -> Result<usize, CoreError> {
        let kind = selectors.kind();
        let before = selectors.before();

        let saved = self
            .state
            .update(|state| {
                let timeline = state
                    .publications
                    .entry(screen_name.to_string())
                    .or_default()
                    .timeline_mut(kind);

                let mut saved = 0;
                for item in items {
                    if before.is_some_and(|cutoff| !item.published_before(cutoff)) {
                        continue;
                    }
                    if timeline.contains_key(&item.id) {
                        continue;
                    }
                    timeline.insert(item.id.clone(), item.clone());
                    saved += 1;
                }
                Ok(if saved > 0 {
                    Change::Changed(saved)
                } else {
                    Change::Unchanged(saved)
                })
            })
            .await?;

        debug!(screen_name, kind = %kind, saved, "Saved publications");
        Ok(saved)
    }

    async fn count_stored(&self, screen_name: &str, kind: PublicationKind) -> Result<u64, CoreError> {
        let count = self
            .state
            .read(|state| {
                state
                    .publications
                    .get(screen_name)
                    .map_or(0, |stored| stored.timeline(kind).len())
            })
            .await?;
        Ok(count as u64)
    }

    async fn find_member(&self, screen_name: &str) -> Result<Option<Member>, CoreError> {
        Ok(self
            .state
            .read(|state| state.members.get(screen_name).cloned())
            .await?)
    }

    async fn ensure_member(&self, screen_name: &str) -> Result<Member, CoreError> {
        Ok(self
            .state
            .update(|state| {
                if let Some(member) = state.members.get(screen_name) {
                    return Ok(Change::Unchanged(member.clone()));
                }

                info!(screen_name, "Creating placeholder member");
                let member = Member::placeholder(screen_name);
                state
                    .members
                    .insert(screen_name.to_string(), member.clone());
                Ok(Change::Changed(member))
            })
            .await?)
    }

    async fn record_extremum(
        &self,
        screen_name: &str,
        kind: PublicationKind,
        bound: Bound,
        value: &PublicationId,
    ) -> Result<MemberExtremum, CoreError> {
        Ok(self
            .state
            .update(|state| {
                let member = state
                    .members
                    .get_mut(screen_name)
                    .ok_or_else(|| StoreError::MemberNotFound(screen_name.to_string()))?;

                let widened = member.extremum.window_mut(kind).widen(bound, value);
                let extremum = member.extremum.clone();
                Ok(if widened {
                    debug!(screen_name, kind = %kind, bound = ?bound, value = %value, "Extremum widened");
                    Change::Changed(extremum)
                } else {
                    Change::Unchanged(extremum)
                })
            })
            .await?)
    }

    async fn mark_curated(
        &self,
        screen_name: &str,
        kind: PublicationKind,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.state
            .update(|state| {
                state
                    .members
                    .entry(screen_name.to_string())
                    .or_insert_with(|| Member::new(screen_name))
                    .set_curated_at(kind, at);
                Ok(Change::Changed(()))
            })
            .await?;
        Ok(())
    }

    async fn mark_member_unavailable(
        &self,
        screen_name: &str,
        availability: MemberAvailability,
    ) -> Result<(), CoreError> {
        self.state
            .update(|state| {
                state
                    .members
                    .entry(screen_name.to_string())
                    .or_insert_with(|| Member::new(screen_name))
                    .availability = availability;
                Ok(Change::Changed(()))
            })
            .await?;
        info!(screen_name, availability = availability.label(), "Member marked unavailable");
        Ok(())
    }
}

// ============================================================================
// WhispererRepository
// ============================================================================

#[async_trait]
impl WhispererRepository for CurationStore {
    async fn find_whisperer(&self, screen_name: &str) -> Result<Option<Whisperer>, CoreError> {
        Ok(self
            .state
            .read(|state| state.whisperers.get(screen_name).cloned())
            .await?)
    }

    async fn declare_whisperer(&self, whisperer: Whisperer) -> Result<(), CoreError> {
        self.state
            .update(|state| {
                state
                    .whisperers
                    .insert(whisperer.screen_name.clone(), whisperer);
                Ok(Change::Changed(()))
            })
            .await?;
        Ok(())
    }

    async fn forget_whisperer(&self, screen_name: &str) -> Result<(), CoreError> {
        self.state
            .update(|state| {
                Ok(match state.whisperers.remove(screen_name) {
                    Some(_) => Change::Changed(()),
                    None => Change::Unchanged(()),
                })
            })
            .await?;
        Ok(())
    }
}

// ============================================================================
// PublishersListRepository
// ============================================================================

#[async_trait]
impl PublishersListRepository for CurationStore {
    async fn find_list(&self, id: u64) -> Result<Option<PublishersList>, CoreError> {
        Ok(self.state.read(|state| state.lists.get(&id).cloned()).await?)
    }

    async fn save_list(&self, list: PublishersList) -> Result<(), CoreError> {
        self.state
            .update(|state| {
                state.lists.insert(list.id, list);
                Ok(Change::Changed(()))
            })
            .await?;
        Ok(())
    }

    async fn lock_list(&self, id: u64) -> Result<LockAttempt, CoreError> {
        let attempt = self
            .state
            .update(|state| {
                let Some(list) = state.lists.get_mut(&id) else {
                    return Ok(Change::Unchanged(LockAttempt::NotFound));
                };
                Ok(if list.lock(Utc::now()) {
                    Change::Changed(LockAttempt::Acquired)
                } else {
                    Change::Unchanged(LockAttempt::AlreadyLocked)
                })
            })
            .await?;
        if attempt == LockAttempt::Acquired {
            debug!(list = id, "Publishers list locked");
        }
        Ok(attempt)
    }

    async fn unlock_list(&self, id: u64) -> Result<(), CoreError> {
        self.state
            .update(|state| {
                let list = state
                    .lists
                    .get_mut(&id)
                    .ok_or(StoreError::ListNotFound(id))?;
                list.unlock(Utc::now());
                Ok(Change::Changed(()))
            })
            .await?;
        debug!(list = id, "Publishers list unlocked");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
