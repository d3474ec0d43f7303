//! End-to-end curation attempts against a scripted API and in-memory stores.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use curator_core::{
    ApiEndpoint, Bound, CoreError, CurationSelectors, LockAttempt, Member, MemberAvailability,
    MemberExtremum, MemberProfile, PageOptions, PersistenceGateway, Publication, PublicationId,
    PublicationKind, PublishersList, PublishersListRepository, RateLimitStatus, Token, TokenPool,
    Whisperer, WhispererRepository,
};
use curator_engine::{
    BlockReason, CurationEngine, CurationOutcome, CurationState, EngineSettings, FailureReason,
    SkipReason,
};
use curator_fetch::{ApiError, PublicationApi};
use curator_store::{CurationStore, TokenStore};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Scripted API
// ============================================================================

#[derive(Default)]
struct ScriptedApi {
    timeline: Mutex<Vec<Publication>>,
    likes: Mutex<Vec<Publication>>,
    ignore_bounds: AtomicBool,
    profile_count: AtomicU64,
    exhausted: Mutex<HashSet<String>>,
    rejected: Mutex<HashSet<String>>,
    errors: Mutex<VecDeque<ApiError>>,
    calls: AtomicUsize,
    pages: Mutex<Vec<(String, PageOptions)>>,
}

impl ScriptedApi {
    fn with_ids(ids: impl IntoIterator<Item = u64>) -> Self {
        let api = Self::default();
        api.push_ids(ids);
        api
    }

    fn push_ids(&self, ids: impl IntoIterator<Item = u64>) {
        let mut timeline = self.timeline.lock().unwrap();
        timeline.extend(
            ids.into_iter()
                .map(|id| Publication::new(PublicationId::from(id), "pierrec", format!("item {id}"))),
        );
        timeline.sort_by(|a, b| b.id.cmp(&a.id));
    }

    /// Newest items are returned whatever the requested bounds.
    fn ignore_bounds(&self) {
        self.ignore_bounds.store(true, Ordering::SeqCst);
    }

    fn set_profile_count(&self, count: u64) {
        self.profile_count.store(count, Ordering::SeqCst);
    }

    fn exhaust(&self, access_token: &str) {
        self.exhausted.lock().unwrap().insert(access_token.to_string());
    }

    fn reject(&self, access_token: &str) {
        self.rejected.lock().unwrap().insert(access_token.to_string());
    }

    fn fail_next_fetch(&self, error: ApiError) {
        self.errors.lock().unwrap().push_back(error);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn page_tokens(&self) -> Vec<String> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .map(|(token, _)| token.clone())
            .collect()
    }
}

#[async_trait]
impl PublicationApi for ScriptedApi {
    async fn fetch_page(
        &self,
        token: &Token,
        selectors: &CurationSelectors,
        options: &PageOptions,
    ) -> Result<Vec<Publication>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected.lock().unwrap().contains(&token.access_token) {
            return Err(ApiError::BadAuthentication {
                code: Some(89),
                message: "Invalid or expired token".into(),
            });
        }
        if let Some(error) = self.errors.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.pages
            .lock()
            .unwrap()
            .push((token.access_token.clone(), options.clone()));

        let timeline = match selectors.kind() {
            PublicationKind::Statuses => self.timeline.lock().unwrap(),
            PublicationKind::Likes => self.likes.lock().unwrap(),
        };
        let bounded = !self.ignore_bounds.load(Ordering::SeqCst);
        Ok(timeline
            .iter()
            .filter(|item| !bounded || options.max_id.as_ref().is_none_or(|max| &item.id <= max))
            .filter(|item| !bounded || options.since_id.as_ref().is_none_or(|since| &item.id > since))
            .take(options.count)
            .cloned()
            .collect())
    }

    async fn check_rate_limit(&self, token: &Token, _endpoint: ApiEndpoint) -> Result<RateLimitStatus, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = if self.exhausted.lock().unwrap().contains(&token.access_token) {
            0
        } else {
            900
        };
        Ok(RateLimitStatus {
            limit: 900,
            remaining,
            reset_at: None,
        })
    }

    async fn fetch_member_profile(&self, _token: &Token, screen_name: &str) -> Result<MemberProfile, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(MemberProfile {
            remote_id: "42".into(),
            screen_name: screen_name.into(),
            statuses_count: self.profile_count.load(Ordering::SeqCst),
            favourites_count: 0,
            protected: false,
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    api: Arc<ScriptedApi>,
    tokens: Arc<TokenStore>,
    store: Arc<CurationStore>,
}

impl Harness {
    fn new(api: ScriptedApi, tokens: &[&str]) -> Self {
        let tokens = tokens
            .iter()
            .map(|access| Token::new(*access, format!("{access}-secret")))
            .collect();
        Self {
            api: Arc::new(api),
            tokens: Arc::new(TokenStore::in_memory(tokens)),
            store: Arc::new(CurationStore::in_memory()),
        }
    }

    fn engine(&self, settings: EngineSettings) -> CurationEngine {
        CurationEngine::builder()
            .api(self.api.clone())
            .tokens(self.tokens.clone())
            .store(self.store.clone())
            .settings(settings)
            .build()
            .unwrap()
    }

    async fn stored(&self) -> u64 {
        self.store
            .count_stored("pierrec", PublicationKind::Statuses)
            .await
            .unwrap()
    }
}

fn ids(range: std::ops::RangeInclusive<u64>) -> impl Iterator<Item = u64> {
    range.map(|n| n * 10)
}

fn always_due() -> EngineSettings {
    EngineSettings {
        update_window: Duration::zero(),
        ..EngineSettings::default()
    }
}

// ============================================================================
// Collection
// ============================================================================

#[tokio::test]
async fn test_first_attempt_collects_whole_timeline() {
    let api = ScriptedApi::with_ids(ids(1..=450));
    api.set_profile_count(450);
    let harness = Harness::new(api, &["aaaaaaaa"]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;

    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert_eq!(report.saved, 450);
    assert_eq!(harness.stored().await, 450);
    assert!(report.visited(CurationState::Recursing));
    assert_eq!(report.states.last(), Some(&CurationState::Done));

    let extremum = harness.store.extremum("pierrec").await.unwrap().unwrap();
    assert_eq!(extremum.statuses.min, Some(PublicationId::from(10)));
    assert_eq!(extremum.statuses.max, Some(PublicationId::from(4500)));
    assert!(
        harness
            .store
            .last_curated_at("pierrec", PublicationKind::Statuses)
            .await
            .unwrap()
            .is_some()
    );

    // Second page continues right below the first one.
    let pages = harness.api.pages.lock().unwrap().clone();
    assert!(pages[0].1.is_unbounded());
    assert_eq!(pages[1].1.max_id, Some(PublicationId::from(2509)));
}

#[tokio::test]
async fn test_recently_curated_member_is_skipped() {
    let harness = Harness::new(ScriptedApi::with_ids(ids(1..=5)), &["aaaaaaaa"]);
    let mut engine = harness.engine(EngineSettings::default());

    assert!(engine.curate(&CurationSelectors::new("pierrec")).await.is_success());
    let calls = harness.api.calls();

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(report.outcome, CurationOutcome::Skipped(SkipReason::RecentlyCurated));
    assert_eq!(harness.api.calls(), calls);
}

#[tokio::test]
async fn test_converged_whisperer_is_skipped_without_remote_call() {
    let api = ScriptedApi::with_ids(ids(1..=50));
    api.set_profile_count(50);
    let harness = Harness::new(api, &["aaaaaaaa"]);
    let mut engine = harness.engine(always_due());

    let first = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(first.outcome, CurationOutcome::Completed);
    let whisperer = harness.store.find_whisperer("pierrec").await.unwrap().unwrap();
    assert_eq!(whisperer.expected_whispers, 50);
    assert_eq!(whisperer.collected_whispers, 50);

    let calls = harness.api.calls();
    let second = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(second.outcome, CurationOutcome::Skipped(SkipReason::Whisperer));
    assert_eq!(harness.api.calls(), calls);

    let forced = engine
        .curate(&CurationSelectors::new("pierrec").with_ignore_whisperers(true))
        .await;
    assert_eq!(forced.outcome, CurationOutcome::Completed);
    assert!(harness.api.calls() > calls);
}

#[tokio::test]
async fn test_empty_likes_do_not_make_a_whisperer() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.set_profile_count(5);
    let harness = Harness::new(api, &["aaaaaaaa"]);
    let mut engine = harness.engine(always_due());

    let likes = engine
        .curate(&CurationSelectors::new("pierrec").with_likes(true))
        .await;
    assert_eq!(likes.outcome, CurationOutcome::Completed);
    assert!(harness.store.find_whisperer("pierrec").await.unwrap().is_none());

    let statuses = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(statuses.outcome, CurationOutcome::Completed);
    assert_eq!(harness.stored().await, 5);
}

#[tokio::test]
async fn test_recent_likes_do_not_postpone_publications() {
    let harness = Harness::new(ScriptedApi::with_ids(ids(1..=5)), &["aaaaaaaa"]);
    let mut engine = harness.engine(EngineSettings::default());
    let likes = CurationSelectors::new("pierrec").with_likes(true);

    assert!(engine.curate(&likes).await.is_success());

    let statuses = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(statuses.outcome, CurationOutcome::Completed);
    assert_eq!(harness.stored().await, 5);

    let again = engine.curate(&likes).await;
    assert_eq!(again.outcome, CurationOutcome::Skipped(SkipReason::RecentlyCurated));
}

#[tokio::test]
async fn test_new_items_are_collected_down_to_the_stored_maximum() {
    let api = ScriptedApi::with_ids(ids(1..=100));
    api.set_profile_count(10_000);
    let harness = Harness::new(api, &["aaaaaaaa"]);
    let mut engine = harness.engine(always_due());

    engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(harness.stored().await, 100);

    harness.api.push_ids(ids(101..=550));
    let report = engine.curate(&CurationSelectors::new("pierrec")).await;

    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert_eq!(report.saved, 450);
    assert_eq!(harness.stored().await, 550);
    assert!(harness.store.find_whisperer("pierrec").await.unwrap().is_none());

    let extremum = harness.store.extremum("pierrec").await.unwrap().unwrap();
    assert_eq!(extremum.statuses.max, Some(PublicationId::from(5500)));
}

/// Two items published within the last day, three older ones.
fn dated_api(now: DateTime<Utc>) -> ScriptedApi {
    let api = ScriptedApi::default();
    {
        let mut timeline = api.timeline.lock().unwrap();
        for (id, hours_ago) in [(50u64, 1), (40, 2), (30, 30), (20, 40), (10, 50)] {
            timeline.push(
                Publication::new(PublicationId::from(id), "pierrec", "text")
                    .with_created_at(now - Duration::hours(hours_ago)),
            );
        }
    }
    api
}

#[tokio::test]
async fn test_items_after_cutoff_are_not_stored() {
    let now = Utc::now();
    let harness = Harness::new(dated_api(now), &["aaaaaaaa"]);
    let mut engine = harness.engine(EngineSettings::default());

    let selectors = CurationSelectors::new("pierrec").with_before(now - Duration::hours(24));
    let report = engine.curate(&selectors).await;

    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert_eq!(report.fetched, 5);
    assert_eq!(report.saved, 3);

    let extremum = harness.store.extremum("pierrec").await.unwrap().unwrap();
    assert_eq!(extremum.statuses.min, Some(PublicationId::from(10)));
    assert_eq!(extremum.statuses.max, Some(PublicationId::from(30)));
}

#[tokio::test]
async fn test_items_after_cutoff_are_collected_by_a_later_attempt() {
    let now = Utc::now();
    let harness = Harness::new(dated_api(now), &["aaaaaaaa"]);
    let mut engine = harness.engine(always_due());

    let cutoff = CurationSelectors::new("pierrec").with_before(now - Duration::hours(24));
    assert_eq!(engine.curate(&cutoff).await.saved, 3);

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert_eq!(report.saved, 2);
    assert_eq!(harness.stored().await, 5);
}

#[tokio::test]
async fn test_cutoff_walks_past_pages_newer_than_the_cutoff() {
    let now = Utc::now();
    let api = ScriptedApi::default();
    {
        let mut timeline = api.timeline.lock().unwrap();
        for (id, hours_ago) in [(60u64, 1), (50, 2), (40, 3), (30, 30), (20, 40), (10, 50)] {
            timeline.push(
                Publication::new(PublicationId::from(id), "pierrec", "text")
                    .with_created_at(now - Duration::hours(hours_ago)),
            );
        }
    }
    let harness = Harness::new(api, &["aaaaaaaa"]);
    let mut engine = harness.engine(EngineSettings {
        page_size: 2,
        ..EngineSettings::default()
    });

    let selectors = CurationSelectors::new("pierrec").with_before(now - Duration::hours(24));
    let report = engine.curate(&selectors).await;

    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert_eq!(report.saved, 3);
    let pages = harness.api.pages.lock().unwrap().clone();
    assert_eq!(pages[1].1.max_id, Some(PublicationId::from(49)));
    assert_eq!(pages[2].1.max_id, Some(PublicationId::from(29)));
}

#[tokio::test]
async fn test_page_inside_stored_window_ends_the_attempt() {
    let api = ScriptedApi::with_ids(ids(1..=300));
    api.ignore_bounds();
    let harness = Harness::new(api, &["aaaaaaaa"]);

    let collected: Vec<_> = ids(101..=300)
        .map(|id| Publication::new(PublicationId::from(id), "pierrec", "text"))
        .collect();
    let selectors = CurationSelectors::new("pierrec");
    harness.store.save(&collected, "pierrec", &selectors).await.unwrap();
    harness.store.ensure_member("pierrec").await.unwrap();
    for (bound, id) in [(Bound::Min, 1010u64), (Bound::Max, 3000)] {
        harness
            .store
            .record_extremum("pierrec", PublicationKind::Statuses, bound, &PublicationId::from(id))
            .await
            .unwrap();
    }

    let mut engine = harness.engine(EngineSettings {
        greedy: false,
        max_pages_per_attempt: 3,
        ..EngineSettings::default()
    });
    let report = engine.curate(&selectors).await;

    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert_eq!(report.pages, 1);
    assert_eq!(report.fetched, 200);
    assert_eq!(report.saved, 0);
    assert_eq!(report.states.last(), Some(&CurationState::Done));
}

#[tokio::test]
async fn test_runaway_pagination_is_bounded() {
    let harness = Harness::new(ScriptedApi::with_ids(ids(1..=1000)), &["aaaaaaaa"]);
    let mut engine = harness.engine(EngineSettings {
        max_pages_per_attempt: 2,
        ..EngineSettings::default()
    });

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(
        report.outcome,
        CurationOutcome::Failed(FailureReason::RunawayPagination { pages: 2 })
    );
    assert_eq!(report.states.last(), Some(&CurationState::Aborted));
}

// ============================================================================
// Tokens
// ============================================================================

#[tokio::test]
async fn test_token_scenario() {
    let now = Utc::now();
    let pool = TokenStore::in_memory(vec![
        Token::new("tokenaaa", "secret").with_frozen_until(Some(now + Duration::seconds(900))),
        Token::new("tokenbbb", "secret"),
    ]);

    let found = pool.find_first_unfrozen_token().await.unwrap().unwrap();
    assert_eq!(found.access_token, "tokenbbb");

    pool.freeze("tokenbbb", now + Duration::seconds(900)).await.unwrap();
    assert!(pool.find_first_unfrozen_token().await.unwrap().is_none());

    let soonest = pool.find_first_frozen_token().await.unwrap().unwrap();
    assert!(["tokenaaa", "tokenbbb"].contains(&soonest.access_token.as_str()));
    assert!(pool.is_frozen("tokenaaa").await.unwrap());
}

#[tokio::test]
async fn test_exhausted_token_is_frozen_and_rotated() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.exhaust("tokenaaa");
    let harness = Harness::new(api, &["tokenaaa", "tokenbbb"]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;

    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert!(harness.tokens.is_frozen("tokenaaa").await.unwrap());
    assert!(harness.api.page_tokens().iter().all(|token| token == "tokenbbb"));
}

#[tokio::test]
async fn test_rate_limit_during_fetch_switches_token() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.fail_next_fetch(ApiError::RateLimited {
        reset_at: Some(Utc::now() + Duration::minutes(3)),
    });
    let harness = Harness::new(api, &["tokenaaa", "tokenbbb"]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;

    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert!(harness.tokens.is_frozen("tokenaaa").await.unwrap());
    assert_eq!(harness.api.page_tokens()[0], "tokenbbb");
}

#[tokio::test]
async fn test_bad_authentication_rotates_once() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.reject("tokenaaa");
    let harness = Harness::new(api, &["tokenaaa", "tokenbbb"]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert!(harness.tokens.is_frozen("tokenaaa").await.unwrap());
}

#[tokio::test]
async fn test_every_token_rejected_is_a_failure() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.reject("tokenaaa");
    api.reject("tokenbbb");
    let harness = Harness::new(api, &["tokenaaa", "tokenbbb"]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(
        report.outcome,
        CurationOutcome::Failed(FailureReason::BadAuthentication)
    );
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_no_tokens_is_a_precondition_failure() {
    let harness = Harness::new(ScriptedApi::with_ids(ids(1..=5)), &[]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(report.outcome, CurationOutcome::Failed(FailureReason::NoTokens));
    assert_eq!(harness.api.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_pool_waits_once_then_blocks() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.exhaust("tokenaaa");
    let harness = Harness::new(api, &["tokenaaa"]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(report.outcome, CurationOutcome::Blocked(BlockReason::ApiUnavailable));
    assert!(
        report
            .states
            .iter()
            .filter(|state| **state == CurationState::CheckingApiAvailability)
            .count()
            == 2
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_backoff() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.exhaust("tokenaaa");
    let harness = Harness::new(api, &["tokenaaa"]);
    let cancel = CancellationToken::new();
    let mut engine = CurationEngine::builder()
        .api(harness.api.clone())
        .tokens(harness.tokens.clone())
        .store(harness.store.clone())
        .cancellation_token(cancel.clone())
        .build()
        .unwrap();

    let selectors = CurationSelectors::new("pierrec");
    let (report, ()) = tokio::join!(engine.curate(&selectors), async {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        cancel.cancel();
    });

    assert_eq!(report.outcome, CurationOutcome::Blocked(BlockReason::Cancelled));
    assert!(
        harness
            .store
            .last_curated_at("pierrec", PublicationKind::Statuses)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_nothing_left_to_collect_with_exhausted_pool() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.exhaust("tokenaaa");
    let harness = Harness::new(api, &["tokenaaa"]);
    let items: Vec<_> = ids(1..=5)
        .map(|id| Publication::new(PublicationId::from(id), "pierrec", "text"))
        .collect();
    harness
        .store
        .save(&items, "pierrec", &CurationSelectors::new("pierrec"))
        .await
        .unwrap();
    harness
        .store
        .declare_whisperer(Whisperer::new("pierrec", 5, 5))
        .await
        .unwrap();
    let mut engine = harness.engine(EngineSettings::default());

    let selectors = CurationSelectors::new("pierrec").with_ignore_whisperers(true);
    let report = engine.curate(&selectors).await;
    assert_eq!(
        report.outcome,
        CurationOutcome::Skipped(SkipReason::NothingLeftToCollect)
    );
}

// ============================================================================
// Member availability
// ============================================================================

#[tokio::test]
async fn test_suspended_member_is_marked_and_skipped_afterwards() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.fail_next_fetch(ApiError::Suspended("User has been suspended.".into()));
    let harness = Harness::new(api, &["aaaaaaaa"]);
    let mut engine = harness.engine(always_due());

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert_eq!(
        report.outcome,
        CurationOutcome::Skipped(SkipReason::MemberUnavailable(MemberAvailability::Suspended))
    );
    assert!(report.is_success());

    let calls = harness.api.calls();
    let again = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert!(matches!(again.outcome, CurationOutcome::Skipped(SkipReason::MemberUnavailable(_))));
    assert_eq!(harness.api.calls(), calls);
}

#[tokio::test]
async fn test_transient_failure_blocks() {
    let api = ScriptedApi::with_ids(ids(1..=5));
    api.fail_next_fetch(ApiError::OverCapacity {
        code: Some(130),
        message: "Over capacity".into(),
    });
    let harness = Harness::new(api, &["aaaaaaaa"]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine.curate(&CurationSelectors::new("pierrec")).await;
    assert!(matches!(
        report.outcome,
        CurationOutcome::Blocked(BlockReason::Transient(_))
    ));
}

#[tokio::test]
async fn test_empty_screen_name_is_skipped() {
    let harness = Harness::new(ScriptedApi::default(), &["aaaaaaaa"]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine.curate(&CurationSelectors::new("  ")).await;
    assert_eq!(report.outcome, CurationOutcome::Skipped(SkipReason::EmptyScreenName));
}

// ============================================================================
// List lock
// ============================================================================

#[derive(Clone, Copy)]
enum SaveFailure {
    Constraint,
    Panic,
}

/// Delegates to a [`CurationStore`] but breaks while saving.
struct BrokenGateway {
    inner: Arc<CurationStore>,
    failure: SaveFailure,
}

#[async_trait]
impl PersistenceGateway for BrokenGateway {
    async fn save(&self, _: &[Publication], _: &str, _: &CurationSelectors) -> Result<usize, CoreError> {
        match self.failure {
            SaveFailure::Constraint => Err(CoreError::ConstraintViolation(
                "duplicate publication id".into(),
            )),
            SaveFailure::Panic => panic!("storage backend crashed"),
        }
    }

    async fn count_stored(&self, screen_name: &str, kind: PublicationKind) -> Result<u64, CoreError> {
        self.inner.count_stored(screen_name, kind).await
    }

    async fn find_member(&self, screen_name: &str) -> Result<Option<Member>, CoreError> {
        self.inner.find_member(screen_name).await
    }

    async fn ensure_member(&self, screen_name: &str) -> Result<Member, CoreError> {
        self.inner.ensure_member(screen_name).await
    }

    async fn record_extremum(
        &self,
        screen_name: &str,
        kind: PublicationKind,
        bound: Bound,
        value: &PublicationId,
    ) -> Result<MemberExtremum, CoreError> {
        self.inner.record_extremum(screen_name, kind, bound, value).await
    }

    async fn mark_curated(
        &self,
        screen_name: &str,
        kind: PublicationKind,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.inner.mark_curated(screen_name, kind, at).await
    }

    async fn mark_member_unavailable(
        &self,
        screen_name: &str,
        availability: MemberAvailability,
    ) -> Result<(), CoreError> {
        self.inner.mark_member_unavailable(screen_name, availability).await
    }
}

async fn broken_attempt(failure: SaveFailure) -> (CurationOutcome, Arc<CurationStore>) {
    let harness = Harness::new(ScriptedApi::with_ids(ids(1..=5)), &["aaaaaaaa"]);
    harness
        .store
        .save_list(PublishersList::new(7, "press").with_members(["pierrec"]))
        .await
        .unwrap();

    let gateway = Arc::new(BrokenGateway {
        inner: harness.store.clone(),
        failure,
    });
    let mut engine = CurationEngine::builder()
        .api(harness.api.clone())
        .tokens(harness.tokens.clone())
        .gateway(gateway)
        .whisperers(harness.store.clone())
        .lists(harness.store.clone())
        .build()
        .unwrap();

    let report = engine
        .curate(&CurationSelectors::new("pierrec").with_list(7))
        .await;
    assert!(report.visited(CurationState::LockingTarget));
    assert!(report.visited(CurationState::Persisting));
    (report.outcome, harness.store)
}

#[tokio::test]
async fn test_lock_released_after_persisting_failure() {
    let (outcome, store) = broken_attempt(SaveFailure::Constraint).await;

    assert_eq!(
        outcome,
        CurationOutcome::Failed(FailureReason::ConstraintViolation(
            "duplicate publication id".into()
        ))
    );
    let list = store.find_list(7).await.unwrap().unwrap();
    assert!(!list.locked);
    assert!(list.unlocked_at.is_some());
}

#[tokio::test]
async fn test_lock_released_after_panic() {
    let (outcome, store) = broken_attempt(SaveFailure::Panic).await;

    assert_eq!(
        outcome,
        CurationOutcome::Failed(FailureReason::Panicked("storage backend crashed".into()))
    );
    assert!(!store.find_list(7).await.unwrap().unwrap().locked);
}

#[tokio::test]
async fn test_locked_list_is_skipped() {
    let harness = Harness::new(ScriptedApi::with_ids(ids(1..=5)), &["aaaaaaaa"]);
    harness
        .store
        .save_list(PublishersList::new(7, "press"))
        .await
        .unwrap();
    assert_eq!(harness.store.lock_list(7).await.unwrap(), LockAttempt::Acquired);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine
        .curate(&CurationSelectors::new("pierrec").with_list(7))
        .await;

    assert_eq!(report.outcome, CurationOutcome::Skipped(SkipReason::ListLocked));
    assert_eq!(harness.api.calls(), 0);
    assert!(harness.store.find_list(7).await.unwrap().unwrap().locked);
}

#[tokio::test]
async fn test_cutoff_attempt_ignores_list_lock() {
    let harness = Harness::new(ScriptedApi::with_ids(ids(1..=5)), &["aaaaaaaa"]);
    harness
        .store
        .save_list(PublishersList::new(7, "press"))
        .await
        .unwrap();
    assert_eq!(harness.store.lock_list(7).await.unwrap(), LockAttempt::Acquired);
    let mut engine = harness.engine(EngineSettings::default());

    let selectors = CurationSelectors::new("pierrec")
        .with_list(7)
        .with_before(Utc::now());
    let report = engine.curate(&selectors).await;

    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert!(!report.visited(CurationState::LockingTarget));
    assert_eq!(harness.stored().await, 5);

    let list = harness.store.find_list(7).await.unwrap().unwrap();
    assert!(list.locked);
    assert!(list.unlocked_at.is_none());
}

#[tokio::test]
async fn test_unknown_list_is_curated_without_lock() {
    let harness = Harness::new(ScriptedApi::with_ids(ids(1..=5)), &["aaaaaaaa"]);
    let mut engine = harness.engine(EngineSettings::default());

    let report = engine
        .curate(&CurationSelectors::new("pierrec").with_list(99))
        .await;
    assert_eq!(report.outcome, CurationOutcome::Completed);
    assert_eq!(harness.stored().await, 5);
}
