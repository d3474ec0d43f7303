//! CLI command implementations.

pub mod config;
pub mod consume;
pub mod curate;
pub mod dispatch;
pub mod lists;
pub mod tokens;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use curator_core::CurationSelectors;
use curator_engine::{CurationEngine, CurationEngineBuilder, EngineSettings};
use curator_fetch::{RetryStrategy, TwitterClient};
use curator_store::{Config, CurationStore, TokenStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Stores opened from the configured data directory.
pub struct Services {
    /// Loaded configuration.
    pub config: Config,
    /// Token pool.
    pub tokens: Arc<TokenStore>,
    /// Members, publications, whisperers and publishers lists.
    pub store: Arc<CurationStore>,
}

impl Services {
    /// Opens both stores.
    pub async fn open(config: &Config) -> Result<Self> {
        let tokens_path = config.storage.tokens_path();
        let curation_path = config.storage.curation_path();

        let tokens = TokenStore::load(tokens_path.clone())
            .await
            .with_context(|| format!("cannot load token pool {}", tokens_path.display()))?;
        let store = CurationStore::load(curation_path.clone())
            .await
            .with_context(|| format!("cannot load curation state {}", curation_path.display()))?;

        debug!(data_dir = %config.storage.data_dir().display(), "Stores opened");
        Ok(Self {
            config: config.clone(),
            tokens: Arc::new(tokens),
            store: Arc::new(store),
        })
    }

    /// Remote API client built from the `api` section.
    pub fn client(&self) -> Result<TwitterClient> {
        let api = &self.config.api;
        let mut client = TwitterClient::new(&api.base_url, std::time::Duration::from_secs(api.timeout_secs))?
            .with_retry(RetryStrategy::new(api.max_retries));
        if let Some((key, secret)) = self.config.consumer() {
            client = client.with_consumer(key, secret);
        }
        Ok(client)
    }

    /// Engine builder wired to the stores and the remote API.
    ///
    /// Clone it once per concurrent attempt.
    pub fn engine_builder(&self, cancel: CancellationToken) -> Result<CurationEngineBuilder> {
        let builder = CurationEngine::builder()
            .api(Arc::new(self.client()?))
            .tokens(self.tokens.clone())
            .store(self.store.clone())
            .settings(engine_settings(&self.config))
            .cancellation_token(cancel);
        Ok(builder)
    }
}

/// Engine tunables from the `curation` and `rate_limit` sections.
pub fn engine_settings(config: &Config) -> EngineSettings {
    let curation = &config.curation;
    EngineSettings {
        page_size: curation.page_size,
        max_pages_per_attempt: curation.max_pages_per_attempt,
        greedy: curation.greedy,
        update_window: Duration::hours(curation.update_window_hours),
        whisperer_window: Duration::days(curation.whisperer_window_days),
        freeze_window: Duration::minutes(config.rate_limit.freeze_minutes),
    }
}

/// Cancellation token tripped by ctrl-c.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after in-flight requests");
            trigger.cancel();
        }
    });
    cancel
}

/// Flags shared by `curate` and `dispatch`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SelectorArgs {
    /// Collect liked publications instead of the member's own.
    #[arg(long)]
    pub likes: bool,

    /// Only store publications published before this instant (RFC 3339).
    #[arg(long)]
    pub before: Option<DateTime<Utc>>,

    /// Curate even members declared as whisperers.
    #[arg(long)]
    pub ignore_whisperers: bool,

    /// Include the list owner.
    #[arg(long)]
    pub include_owner: bool,
}

impl SelectorArgs {
    /// Applies the flags to `selectors`.
    pub fn apply(&self, selectors: &CurationSelectors) -> CurationSelectors {
        let selectors = selectors
            .with_likes(self.likes)
            .with_ignore_whisperers(self.ignore_whisperers)
            .with_include_owner(self.include_owner);
        match self.before {
            Some(before) => selectors.with_before(before),
            None => selectors,
        }
    }
}
