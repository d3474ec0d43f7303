//! The curation state machine.
//!
//! One [`CurationEngine::curate`] call is one attempt at collecting the
//! timeline of a member. The attempt walks the states of
//! [`CurationState`] in an explicit loop; every state function returns a
//! [`Transition`] and the loop stops at the first terminal one.

use std::borrow::Cow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use curator_core::{
    COLLECTION_LIMIT_MARGIN, CurationSelectors, DEFAULT_FREEZE_MINUTES, IdWindow, LockAttempt,
    MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER, MAX_BATCH_SIZE, PageOptions, PersistenceGateway,
    Publication, PublicationId, PublishersListRepository, RECENTLY_CURATED_HOURS, TokenPool,
    WHISPERER_WINDOW_DAYS, WhispererRepository,
};
use curator_fetch::{BackoffScheduler, PublicationApi, RateLimitGuard, WaitOutcome, timeline_endpoint};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::EngineError;
use crate::extremum::ExtremumTracker;
use crate::state::{
    BlockReason, CurationOutcome, CurationReport, CurationState, FailureReason, SkipReason,
    Transition,
};
use crate::whisperer::WhispererDetector;

// ============================================================================
// Settings
// ============================================================================

/// Tunables of the curation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Items requested per page.
    pub page_size: usize,
    /// Pages one attempt may fetch.
    pub max_pages_per_attempt: usize,
    /// Collect newer items once older ones are exhausted.
    pub greedy: bool,
    /// A member curated within this window is skipped.
    pub update_window: Duration,
    /// How long a whisperer declaration is honoured.
    pub whisperer_window: Duration,
    /// Freeze applied to a token when no reset time is known.
    pub freeze_window: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: MAX_BATCH_SIZE,
            max_pages_per_attempt: 32,
            greedy: true,
            update_window: Duration::hours(RECENTLY_CURATED_HOURS),
            whisperer_window: Duration::days(WHISPERER_WINDOW_DAYS),
            freeze_window: Duration::minutes(DEFAULT_FREEZE_MINUTES),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds a [`CurationEngine`] from its collaborators.
///
/// The builder is cheap to clone, so one builder can produce an engine per
/// concurrent attempt.
#[derive(Clone, Default)]
pub struct CurationEngineBuilder {
    api: Option<Arc<dyn PublicationApi>>,
    tokens: Option<Arc<dyn TokenPool>>,
    gateway: Option<Arc<dyn PersistenceGateway>>,
    whisperers: Option<Arc<dyn WhispererRepository>>,
    lists: Option<Arc<dyn PublishersListRepository>>,
    settings: EngineSettings,
    cancel: CancellationToken,
}

impl CurationEngineBuilder {
    /// Sets the remote API.
    pub fn api(mut self, api: Arc<dyn PublicationApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Sets the token pool.
    pub fn tokens(mut self, tokens: Arc<dyn TokenPool>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Sets the persistence gateway.
    pub fn gateway(mut self, gateway: Arc<dyn PersistenceGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Sets the whisperer repository.
    pub fn whisperers(mut self, whisperers: Arc<dyn WhispererRepository>) -> Self {
        self.whisperers = Some(whisperers);
        self
    }

    /// Sets the publishers list repository.
    pub fn lists(mut self, lists: Arc<dyn PublishersListRepository>) -> Self {
        self.lists = Some(lists);
        self
    }

    /// Uses one store for persistence, whisperers and lists.
    pub fn store<S>(self, store: Arc<S>) -> Self
    where
        S: PersistenceGateway + WhispererRepository + PublishersListRepository + 'static,
    {
        self.gateway(store.clone())
            .whisperers(store.clone())
            .lists(store)
    }

    /// Sets the tunables.
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the token cancelling backoff waits and pending transitions.
    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingCollaborator`] naming the first
    /// collaborator that was not set.
    pub fn build(self) -> Result<CurationEngine, EngineError> {
        let api = self.api.ok_or(EngineError::MissingCollaborator("api"))?;
        let tokens = self.tokens.ok_or(EngineError::MissingCollaborator("tokens"))?;
        let gateway = self.gateway.ok_or(EngineError::MissingCollaborator("gateway"))?;
        let whisperers = self
            .whisperers
            .ok_or(EngineError::MissingCollaborator("whisperers"))?;
        let lists = self.lists.ok_or(EngineError::MissingCollaborator("lists"))?;

        let guard = RateLimitGuard::new(api.clone(), tokens.clone())
            .with_freeze_window(self.settings.freeze_window);
        let detector = WhispererDetector::new(api.clone(), gateway.clone(), whisperers.clone())
            .with_window(self.settings.whisperer_window);

        Ok(CurationEngine {
            api,
            tokens,
            extremum: ExtremumTracker::new(gateway.clone()),
            gateway,
            whisperers,
            lists,
            guard,
            detector,
            backoff: BackoffScheduler::new(self.cancel),
            settings: self.settings,
        })
    }
}

// ============================================================================
// Attempt
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Older items, below the stored minimum.
    Backward,
    /// Newer items, above the stored maximum.
    Forward,
}

/// Bounds pinned while walking down a forward gap.
#[derive(Debug, Clone)]
struct Gap {
    since_id: PublicationId,
    max_id: PublicationId,
}

/// Working state of one attempt.
struct Attempt {
    selectors: CurationSelectors,
    report: CurationReport,
    direction: Direction,
    options: PageOptions,
    batch: Vec<Publication>,
    prior_window: IdWindow,
    last_saved: usize,
    gap: Option<Gap>,
    /// Upper bound of the next backward page.
    floor: Option<PublicationId>,
    waited_for_api: bool,
    rotated_token: bool,
    forward_pass_started: bool,
    whisperer_checked: bool,
    whisperer_forgotten: bool,
}

impl Attempt {
    fn new(selectors: CurationSelectors) -> Self {
        Self {
            report: CurationReport::new(selectors.screen_name()),
            selectors,
            direction: Direction::Backward,
            options: PageOptions::default(),
            batch: Vec::new(),
            prior_window: IdWindow::default(),
            last_saved: 0,
            gap: None,
            floor: None,
            waited_for_api: false,
            rotated_token: false,
            forward_pass_started: false,
            whisperer_checked: false,
            whisperer_forgotten: false,
        }
    }
}

/// Splits a state result into the next state or the final outcome.
fn settle(step: Result<Transition, EngineError>) -> Result<CurationState, CurationOutcome> {
    match step {
        Ok(Transition::Continue(next)) => Ok(next),
        Ok(Transition::SkipBenign(reason)) => Err(CurationOutcome::Skipped(reason)),
        Ok(Transition::SkipBlocked(reason)) => Err(CurationOutcome::Blocked(reason)),
        Ok(Transition::Failed(reason)) => Err(CurationOutcome::Failed(reason)),
        Err(err) => Err(failure(&err)),
    }
}

fn failure(err: &EngineError) -> CurationOutcome {
    if err.is_constraint_violation() {
        error!(severity = "critical", error = %err, "Constraint violation");
    }
    CurationOutcome::Failed(FailureReason::from(err))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Collects the timeline of one member per attempt.
pub struct CurationEngine {
    api: Arc<dyn PublicationApi>,
    tokens: Arc<dyn TokenPool>,
    gateway: Arc<dyn PersistenceGateway>,
    whisperers: Arc<dyn WhispererRepository>,
    lists: Arc<dyn PublishersListRepository>,
    guard: RateLimitGuard,
    extremum: ExtremumTracker,
    detector: WhispererDetector,
    backoff: BackoffScheduler,
    settings: EngineSettings,
}

impl CurationEngine {
    /// Starts building an engine.
    pub fn builder() -> CurationEngineBuilder {
        CurationEngineBuilder::default()
    }

    /// The tunables.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs one curation attempt.
    #[instrument(skip(self, selectors), fields(screen_name = selectors.screen_name(), kind = %selectors.kind()))]
    pub async fn curate(&mut self, selectors: &CurationSelectors) -> CurationReport {
        let started = Instant::now();
        let mut attempt = Attempt::new(selectors.clone());

        let outcome = self.run(&mut attempt).await;

        match &outcome {
            CurationOutcome::Completed => info!(
                pages = attempt.report.pages,
                saved = attempt.report.saved,
                "Curation completed"
            ),
            CurationOutcome::Skipped(reason) => info!(reason = ?reason, "Nothing to do"),
            CurationOutcome::Blocked(reason) => warn!(reason = ?reason, "Curation blocked"),
            CurationOutcome::Failed(reason) => error!(
                reason = ?reason,
                pages = attempt.report.pages,
                states = ?attempt.report.states,
                "Curation failed"
            ),
        }

        attempt.report.finish(outcome, started.elapsed());
        attempt.report
    }

    async fn run(&mut self, attempt: &mut Attempt) -> CurationOutcome {
        attempt.report.enter(CurationState::CheckingSkip);
        let next = match settle(self.check_skip(&attempt.selectors).await) {
            Ok(next) => next,
            Err(outcome) => return outcome,
        };

        let mut held = None;
        if let (CurationState::LockingTarget, Some(list_id)) = (next, attempt.selectors.list_id()) {
            if self.backoff.is_cancelled() {
                return CurationOutcome::Blocked(BlockReason::Cancelled);
            }
            attempt.report.enter(CurationState::LockingTarget);
            match self.lists.lock_list(list_id).await {
                Ok(LockAttempt::Acquired) => {
                    info!(list = list_id, "Publishers list locked");
                    held = Some(list_id);
                }
                Ok(LockAttempt::AlreadyLocked) => {
                    info!(list = list_id, "Publishers list already locked by another curator");
                    return CurationOutcome::Skipped(SkipReason::ListLocked);
                }
                Ok(LockAttempt::NotFound) => {
                    warn!(list = list_id, "Unknown publishers list, curating without lock");
                }
                Err(err) => return failure(&EngineError::from(err)),
            }
        }

        let body = AssertUnwindSafe(self.collect(attempt)).catch_unwind().await;
        let outcome = body.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, states = ?attempt.report.states, "Curation attempt panicked");
            CurationOutcome::Failed(FailureReason::Panicked(message))
        });

        if let Some(list_id) = held {
            match self.lists.unlock_list(list_id).await {
                Ok(()) => info!(list = list_id, "Publishers list unlocked"),
                Err(err) => error!(list = list_id, error = %err, "Failed to unlock publishers list"),
            }
        }
        outcome
    }

    async fn collect(&mut self, attempt: &mut Attempt) -> CurationOutcome {
        if let Err(err) = self.choose_direction(attempt).await {
            return failure(&err);
        }

        let mut state = CurationState::CheckingApiAvailability;
        loop {
            if self.backoff.is_cancelled() {
                info!(state = %state, "Cancellation requested");
                return CurationOutcome::Blocked(BlockReason::Cancelled);
            }
            attempt.report.enter(state);

            let step = match state {
                CurationState::CheckingApiAvailability => self.check_api_availability(attempt).await,
                CurationState::Fetching => self.fetch(attempt).await,
                CurationState::Persisting => self.persist(attempt).await,
                CurationState::Recursing => Ok(self.recurse(attempt)),
                CurationState::Done => {
                    return match self
                        .gateway
                        .mark_curated(
                            attempt.selectors.screen_name(),
                            attempt.selectors.kind(),
                            Utc::now(),
                        )
                        .await
                    {
                        Ok(()) => CurationOutcome::Completed,
                        Err(err) => failure(&EngineError::from(err)),
                    };
                }
                other => Ok(Transition::Failed(FailureReason::Unexpected(format!(
                    "state {other} cannot be run"
                )))),
            };

            match settle(step) {
                Ok(next) => {
                    debug!(from = %state, to = %next, "Transition");
                    state = next;
                }
                Err(outcome) => return outcome,
            }
        }
    }

    // ------------------------------------------------------------------------
    // Checking skip
    // ------------------------------------------------------------------------

    async fn check_skip(&self, selectors: &CurationSelectors) -> Result<Transition, EngineError> {
        let screen_name = selectors.screen_name();
        if screen_name.trim().is_empty() {
            return Ok(Transition::SkipBenign(SkipReason::EmptyScreenName));
        }

        if self.tokens.count().await? == 0 {
            return Ok(Transition::Failed(FailureReason::NoTokens));
        }

        let availability = self.gateway.member_availability(screen_name).await?;
        if !availability.is_available() {
            return Ok(Transition::SkipBenign(SkipReason::MemberUnavailable(availability)));
        }

        if selectors.cursor().is_none() && selectors.before().is_none() {
            if let Some(member) = self.gateway.find_member(screen_name).await? {
                if member.curated_within(selectors.kind(), Utc::now(), self.settings.update_window) {
                    return Ok(Transition::SkipBenign(SkipReason::RecentlyCurated));
                }
            }
        }

        if !selectors.ignore_whisperers() && self.detector.should_skip(selectors).await? {
            return Ok(Transition::SkipBenign(SkipReason::Whisperer));
        }

        // Collecting before a cutoff never competes with the curators of the list.
        let next = match (selectors.list_id(), selectors.before()) {
            (Some(_), None) => CurationState::LockingTarget,
            (Some(list_id), Some(_)) => {
                debug!(list = list_id, "Collecting before a cutoff, list lock not taken");
                CurationState::CheckingApiAvailability
            }
            (None, _) => CurationState::CheckingApiAvailability,
        };
        Ok(Transition::Continue(next))
    }

    /// Goes forward straight away once the platform cap is nearly reached.
    async fn choose_direction(&self, attempt: &mut Attempt) -> Result<(), EngineError> {
        let stored = self
            .gateway
            .count_stored(attempt.selectors.screen_name(), attempt.selectors.kind())
            .await?;
        if stored >= MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER - COLLECTION_LIMIT_MARGIN {
            debug!(stored, "Older items out of reach, collecting newer ones");
            attempt.direction = Direction::Forward;
            attempt.forward_pass_started = true;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Checking API availability
    // ------------------------------------------------------------------------

    async fn check_api_availability(&mut self, attempt: &mut Attempt) -> Result<Transition, EngineError> {
        let endpoint = timeline_endpoint(&attempt.selectors);
        if self.guard.guard_against_limit(endpoint).await?.is_some() {
            return Ok(Transition::Continue(CurationState::Fetching));
        }

        if !self.remaining_items_to_collect(&attempt.selectors).await? {
            info!("API unavailable, nothing left to collect");
            return Ok(Transition::SkipBenign(SkipReason::NothingLeftToCollect));
        }
        if attempt.waited_for_api {
            return Ok(Transition::SkipBlocked(BlockReason::ApiUnavailable));
        }
        attempt.waited_for_api = true;

        let (seconds, prefix) = self.guard.next_unfreeze().await?.unwrap_or_default();
        match self.backoff.wait_for(seconds, &prefix).await {
            WaitOutcome::Elapsed => Ok(Transition::Continue(CurationState::CheckingApiAvailability)),
            WaitOutcome::Cancelled => Ok(Transition::SkipBlocked(BlockReason::Cancelled)),
        }
    }

    async fn remaining_items_to_collect(&self, selectors: &CurationSelectors) -> Result<bool, EngineError> {
        let screen_name = selectors.screen_name();
        let stored = self.gateway.count_stored(screen_name, selectors.kind()).await?;
        let whisperer = if WhispererDetector::applies_to(selectors) {
            self.whisperers.find_whisperer(screen_name).await?
        } else {
            None
        };
        let known_total = whisperer
            .map_or(MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER, |whisperer| whisperer.expected_whispers);

        Ok(stored < known_total.min(MAX_AVAILABLE_PUBLICATIONS_PER_MEMBER))
    }

    // ------------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------------

    async fn page_options(&self, attempt: &Attempt) -> Result<PageOptions, EngineError> {
        let options = PageOptions::unbounded(self.settings.page_size);
        if let Some(gap) = &attempt.gap {
            return Ok(options
                .with_since_id(gap.since_id.clone())
                .with_max_id(gap.max_id.clone()));
        }
        if let (Direction::Backward, Some(floor)) = (attempt.direction, &attempt.floor) {
            return Ok(options.with_max_id(floor.clone()));
        }
        self.extremum
            .update_extremum(
                &attempt.selectors,
                options,
                attempt.direction == Direction::Backward,
            )
            .await
    }

    async fn fetch(&mut self, attempt: &mut Attempt) -> Result<Transition, EngineError> {
        let Some(token) = self.guard.active_token().cloned() else {
            return Ok(Transition::Continue(CurationState::CheckingApiAvailability));
        };
        let options = self.page_options(attempt).await?;

        match self.api.fetch_page(&token, &attempt.selectors, &options).await {
            Ok(batch) => {
                debug!(token = token.prefix(), items = batch.len(), "Page fetched");
                attempt.report.pages += 1;
                attempt.report.fetched += batch.len();
                attempt.options = options;
                attempt.batch = batch;
                Ok(Transition::Continue(CurationState::Persisting))
            }
            Err(err) if err.is_bad_authentication() => {
                if attempt.rotated_token {
                    return Ok(Transition::Failed(FailureReason::BadAuthentication));
                }
                attempt.rotated_token = true;
                match self.guard.rotate_after_bad_authentication().await? {
                    Some(_) => Ok(Transition::Continue(CurationState::Fetching)),
                    None => Ok(Transition::Failed(FailureReason::BadAuthentication)),
                }
            }
            Err(err) if err.is_rate_limited() => {
                info!(token = token.prefix(), "Rate limited while fetching");
                self.guard.freeze_active(err.reset_at()).await?;
                Ok(Transition::Continue(CurationState::CheckingApiAvailability))
            }
            Err(err) => {
                if let Some(availability) = err.member_availability() {
                    self.gateway
                        .mark_member_unavailable(attempt.selectors.screen_name(), availability)
                        .await?;
                    return Ok(Transition::SkipBenign(SkipReason::MemberUnavailable(availability)));
                }
                if err.is_transient() {
                    return Ok(Transition::SkipBlocked(BlockReason::Transient(err.to_string())));
                }
                Ok(Transition::Failed(FailureReason::Unexpected(err.to_string())))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Persisting
    // ------------------------------------------------------------------------

    async fn persist(&mut self, attempt: &mut Attempt) -> Result<Transition, EngineError> {
        let screen_name = attempt.selectors.screen_name().to_string();
        let kind = attempt.selectors.kind();

        attempt.prior_window = self.extremum.window(&attempt.selectors).await?;

        let saved = self
            .gateway
            .save(&attempt.batch, &screen_name, &attempt.selectors)
            .await?;
        attempt.last_saved = saved;
        attempt.report.saved += saved;

        // The window only ever covers items that could be stored.
        let storable: Cow<'_, [Publication]> = match attempt.selectors.before() {
            Some(cutoff) => Cow::Owned(
                attempt
                    .batch
                    .iter()
                    .filter(|item| item.published_before(cutoff))
                    .cloned()
                    .collect(),
            ),
            None => Cow::Borrowed(&attempt.batch),
        };
        if !storable.is_empty() {
            // The first page ever opens the window on both sides.
            let first_page = attempt.options.is_unbounded();
            let forward = attempt.direction == Direction::Forward;
            if forward || first_page {
                self.extremum
                    .declare_extremum(&screen_name, kind, &storable, true)
                    .await?;
            }
            if !forward || first_page {
                self.extremum
                    .declare_extremum(&screen_name, kind, &storable, false)
                    .await?;
            }
        }
        if !attempt.batch.is_empty() {
            attempt.waited_for_api = false;
        }

        if attempt.batch.is_empty() && !attempt.whisperer_checked {
            attempt.whisperer_checked = true;
            if let Some(token) = self.guard.active_token().cloned() {
                match self
                    .detector
                    .identify_whisperer(&token, &attempt.selectors, attempt.batch.len())
                    .await
                {
                    Ok(_) => {}
                    Err(EngineError::Api(err)) => warn!(error = %err, "Whisperer check failed"),
                    Err(err) => return Err(err),
                }
            }
        } else if saved > 0 && !attempt.whisperer_forgotten {
            attempt.whisperer_forgotten = true;
            if WhispererDetector::applies_to(&attempt.selectors) {
                self.whisperers.forget_whisperer(&screen_name).await?;
            }
        }

        debug!(items = attempt.batch.len(), saved, "Page persisted");
        Ok(Transition::Continue(CurationState::Recursing))
    }

    // ------------------------------------------------------------------------
    // Recursing
    // ------------------------------------------------------------------------

    /// Returns true when the current direction has nothing more to give.
    fn direction_exhausted(attempt: &Attempt) -> bool {
        let (Some(newest), Some(oldest)) = (attempt.batch.first(), attempt.batch.last()) else {
            return true;
        };
        if attempt.batch.len() < attempt.options.count {
            return true;
        }

        let within_window = !attempt.options.reaches_past_last_fetch()
            && attempt.prior_window.is_complete()
            && attempt.prior_window.encloses(&oldest.id, &newest.id)
            && attempt.last_saved == 0;
        if within_window {
            debug!(oldest = %oldest.id, newest = %newest.id, "Page already collected");
        }
        within_window
    }

    /// Pins the bounds below a full forward page.
    fn next_gap(attempt: &Attempt) -> Option<Gap> {
        if attempt.direction != Direction::Forward {
            return None;
        }
        Some(Gap {
            since_id: attempt.options.since_id.clone()?,
            max_id: attempt.batch.last()?.id.predecessor()?,
        })
    }

    /// Continues below the oldest item of a full backward page, whether or
    /// not that item was stored.
    fn next_floor(attempt: &Attempt) -> Option<PublicationId> {
        if attempt.direction != Direction::Backward {
            return None;
        }
        attempt.batch.last()?.id.predecessor()
    }

    fn recurse(&self, attempt: &mut Attempt) -> Transition {
        let pages = attempt.report.pages;
        let out_of_pages = pages >= self.settings.max_pages_per_attempt;

        if !Self::direction_exhausted(attempt) {
            if out_of_pages {
                return Transition::Failed(FailureReason::RunawayPagination { pages });
            }
            attempt.gap = Self::next_gap(attempt);
            attempt.floor = Self::next_floor(attempt);
            return Transition::Continue(CurationState::Fetching);
        }
        attempt.gap = None;
        attempt.floor = None;

        let greedy = self.settings.greedy && attempt.selectors.before().is_none();
        if greedy && attempt.direction == Direction::Backward && !attempt.forward_pass_started {
            if out_of_pages {
                return Transition::Failed(FailureReason::RunawayPagination { pages });
            }
            info!(pages, "Older items exhausted, collecting newer ones");
            attempt.direction = Direction::Forward;
            attempt.forward_pass_started = true;
            return Transition::Continue(CurationState::Fetching);
        }

        Transition::Continue(CurationState::Done)
    }
}
