// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Curator Engine
//!
//! The curation state machine and the policies it drives.
//!
//! ## Key Types
//!
//! - [`CurationEngine`] - Runs one curation attempt per call
//! - [`CurationReport`] - What an attempt did and how it ended
//! - [`ExtremumTracker`] - Page bounds from the collected id window
//! - [`WhispererDetector`] - Recognizes members with nothing new to collect
//! - [`ListDispatcher`] - One work-queue message per list member
//!
//! ## Example
//!
//! ```ignore
//! use curator_engine::CurationEngine;
//!
//! let mut engine = CurationEngine::builder()
//!     .api(client)
//!     .tokens(token_store)
//!     .store(curation_store)
//!     .build()?;
//!
//! let report = engine.curate(&CurationSelectors::new("pierrec")).await;
//! ```

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod extremum;
pub mod state;
pub mod whisperer;

pub use dispatch::ListDispatcher;
pub use engine::{CurationEngine, CurationEngineBuilder, EngineSettings};
pub use error::EngineError;
pub use extremum::{ExtremumTracker, MAX_EXTREMUM_ATTEMPTS, next_page_options};
pub use state::{
    BlockReason, CurationOutcome, CurationReport, CurationState, FailureReason, SkipReason,
    Transition,
};
pub use whisperer::WhispererDetector;
