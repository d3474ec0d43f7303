// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Curator Store
//!
//! File-backed state for the curator.
//!
//! This crate provides:
//!
//! - **TokenStore**: The OAuth token pool, re-read on every lookup and written
//!   through on every freeze
//! - **CurationStore**: Members, id windows, publications, whisperers and lists
//! - **Config**: User configuration with defaults for every field
//! - **Persistence**: Atomic JSON file I/O with owner-only permissions, and
//!   state files shared between processes under an advisory lock
//!
//! ## Usage
//!
//! ```ignore
//! use curator_store::{Config, CurationStore, TokenStore};
//!
//! let config = Config::load()?;
//! let tokens = TokenStore::load(config.storage.tokens_path()).await?;
//! let state = CurationStore::load(config.storage.curation_path()).await?;
//! ```

pub mod config;
pub mod curation_store;
pub mod error;
pub mod persistence;
pub mod token_store;

pub use config::{ApiConfig, Config, CurationConfig, GeneralConfig, RateLimitConfig, StorageConfig};
pub use curation_store::CurationStore;
pub use error::StoreError;
pub use persistence::{
    Change, FileLock, SharedJson, default_config_dir, default_curation_path, default_data_dir,
    default_tokens_path, ensure_dir, load_json, load_json_or_default, save_json,
};
pub use token_store::TokenStore;
