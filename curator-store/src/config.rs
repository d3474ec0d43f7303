//! Configuration management.

use crate::error::StoreError;
use crate::persistence::{default_config_dir, default_data_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Curator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Remote API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Token freezing.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Curation behaviour.
    #[serde(default)]
    pub curation: CurationConfig,
    /// Where state is stored.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log filter (`RUST_LOG` syntax).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Consumer key used to sign user tokens lacking their own.
    #[serde(default)]
    pub consumer_key: Option<String>,
    /// Consumer secret paired with `consumer_key`.
    #[serde(default)]
    pub consumer_secret: Option<String>,
}

/// Token freezing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Freeze applied when no reset time is known.
    #[serde(default = "default_freeze_minutes")]
    pub freeze_minutes: i64,
}

/// Curation behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationConfig {
    /// A member curated within this many hours is skipped.
    #[serde(default = "default_update_window_hours")]
    pub update_window_hours: i64,
    /// Items requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Pages fetched by one attempt before giving up.
    #[serde(default = "default_max_pages_per_attempt")]
    pub max_pages_per_attempt: usize,
    /// Run a forward pass once a backward pass is exhausted.
    #[serde(default = "default_true")]
    pub greedy: bool,
    /// Days a whisperer declaration is honoured.
    #[serde(default = "default_whisperer_window_days")]
    pub whisperer_window_days: i64,
    /// Concurrent attempts when consuming messages.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Where state is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory, platform default when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.twitter.com/1.1/".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    5
}

fn default_freeze_minutes() -> i64 {
    curator_core::DEFAULT_FREEZE_MINUTES
}

fn default_update_window_hours() -> i64 {
    curator_core::RECENTLY_CURATED_HOURS
}

fn default_page_size() -> usize {
    curator_core::MAX_BATCH_SIZE
}

fn default_max_pages_per_attempt() -> usize {
    // Two full walks of the 3200 item platform cap.
    32
}

fn default_true() -> bool {
    true
}

fn default_whisperer_window_days() -> i64 {
    curator_core::WHISPERER_WINDOW_DAYS
}

fn default_workers() -> usize {
    4
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            consumer_key: None,
            consumer_secret: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            freeze_minutes: default_freeze_minutes(),
        }
    }
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            update_window_hours: default_update_window_hours(),
            page_size: default_page_size(),
            max_pages_per_attempt: default_max_pages_per_attempt(),
            greedy: true,
            whisperer_window_days: default_whisperer_window_days(),
            workers: default_workers(),
        }
    }
}

impl StorageConfig {
    /// Directory holding the token pool and curation state.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Token pool file.
    pub fn tokens_path(&self) -> PathBuf {
        self.data_dir().join("tokens.json")
    }

    /// Curation state file.
    pub fn curation_path(&self) -> PathBuf {
        self.data_dir().join("curation.json")
    }
}

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_dir().join("config.json")
    }

    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but is unreadable or invalid.
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but is unreadable or invalid.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to the default path.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save(&self) -> Result<(), StoreError> {
        self.save_to(&Self::default_path())
    }

    /// Saves configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Checks values the curation engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), StoreError> {
        let invalid = |field: &str, reason: &str| Err(StoreError::Config(format!("{field}: {reason}")));

        if url::Url::parse(&self.api.base_url).is_err() {
            return invalid("api.base_url", "not a valid URL");
        }
        if self.api.timeout_secs == 0 {
            return invalid("api.timeout_secs", "must be positive");
        }
        if self.api.max_retries == 0 {
            return invalid("api.max_retries", "must be positive");
        }
        if self.api.consumer_key.is_some() != self.api.consumer_secret.is_some() {
            return invalid("api.consumer_key", "consumer key and secret go together");
        }
        if self.rate_limit.freeze_minutes <= 0 {
            return invalid("rate_limit.freeze_minutes", "must be positive");
        }
        if self.curation.page_size == 0 || self.curation.page_size > curator_core::MAX_BATCH_SIZE {
            return invalid("curation.page_size", "must be between 1 and 200");
        }
        if self.curation.max_pages_per_attempt == 0 {
            return invalid("curation.max_pages_per_attempt", "must be positive");
        }
        if self.curation.update_window_hours < 0 {
            return invalid("curation.update_window_hours", "must not be negative");
        }
        if self.curation.whisperer_window_days < 0 {
            return invalid("curation.whisperer_window_days", "must not be negative");
        }
        if self.curation.workers == 0 {
            return invalid("curation.workers", "must be positive");
        }
        Ok(())
    }

    /// Consumer credentials, when both halves are configured.
    pub fn consumer(&self) -> Option<(&str, &str)> {
        match (&self.api.consumer_key, &self.api.consumer_secret) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }
}
