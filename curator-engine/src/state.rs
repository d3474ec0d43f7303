//! Curation states, transitions and reports.

use std::fmt;
use std::time::Duration;

use curator_core::{CoreError, MemberAvailability};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ============================================================================
// States
// ============================================================================

/// States of a curation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurationState {
    /// Not started.
    Idle,
    /// Deciding whether the member needs curating.
    CheckingSkip,
    /// Acquiring the publishers list lock.
    LockingTarget,
    /// Selecting a token with calls left.
    CheckingApiAvailability,
    /// Requesting a page.
    Fetching,
    /// Storing the page.
    Persisting,
    /// Deciding whether another page is needed.
    Recursing,
    /// Finished.
    Done,
    /// Ended early without fetching.
    Skipped,
    /// Ended on a fatal error.
    Aborted,
}

impl CurationState {
    /// Returns a short label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingSkip => "checking skip",
            Self::LockingTarget => "locking target",
            Self::CheckingApiAvailability => "checking api availability",
            Self::Fetching => "fetching",
            Self::Persisting => "persisting",
            Self::Recursing => "recursing",
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CurationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Reasons
// ============================================================================

/// Why an attempt ended without work, successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No screen name was given.
    EmptyScreenName,
    /// The member cannot be collected.
    MemberUnavailable(MemberAvailability),
    /// The member was curated within the update window.
    RecentlyCurated,
    /// The member publishes nothing new.
    Whisperer,
    /// Another curator holds the publishers list.
    ListLocked,
    /// Every item the platform serves is already stored.
    NothingLeftToCollect,
}

/// Why an attempt could not make progress for now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// Every token stayed exhausted after waiting.
    ApiUnavailable,
    /// The remote API failed in a way worth retrying later.
    Transient(String),
    /// Shutdown was requested.
    Cancelled,
}

/// Why an attempt broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No token is configured.
    NoTokens,
    /// Every token was rejected.
    BadAuthentication,
    /// Pagination did not converge within the page budget.
    RunawayPagination {
        /// Pages fetched.
        pages: usize,
    },
    /// Two curators raced on the same record.
    ConstraintViolation(String),
    /// The member id window could not be recorded.
    Extremum(String),
    /// Storage failed.
    Storage(String),
    /// The attempt panicked.
    Panicked(String),
    /// Anything else.
    Unexpected(String),
}

impl From<&EngineError> for FailureReason {
    fn from(error: &EngineError) -> Self {
        match error {
            EngineError::Core(CoreError::ConstraintViolation(message)) => {
                Self::ConstraintViolation(message.clone())
            }
            EngineError::Core(err) => Self::Storage(err.to_string()),
            EngineError::ExtremumRetriesExhausted { .. } => Self::Extremum(error.to_string()),
            EngineError::Api(err) if err.is_bad_authentication() => Self::BadAuthentication,
            EngineError::Api(_) | EngineError::ListNotFound(_) | EngineError::MissingCollaborator(_) => {
                Self::Unexpected(error.to_string())
            }
        }
    }
}

// ============================================================================
// Transitions and Outcomes
// ============================================================================

/// Result of one state function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Move on to the next state.
    Continue(CurationState),
    /// End successfully without further work.
    SkipBenign(SkipReason),
    /// End without progress, to be retried later.
    SkipBlocked(BlockReason),
    /// End on a failure.
    Failed(FailureReason),
}

/// Final result of an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CurationOutcome {
    /// Every needed page was collected.
    Completed,
    /// Nothing to do.
    Skipped(SkipReason),
    /// Could not make progress.
    Blocked(BlockReason),
    /// Broken.
    Failed(FailureReason),
}

impl CurationOutcome {
    /// Returns true for completed and skipped attempts.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped(_))
    }

    /// Returns a short label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped(_) => "skipped",
            Self::Blocked(_) => "blocked",
            Self::Failed(_) => "failed",
        }
    }

    /// Terminal state the outcome corresponds to.
    pub fn terminal_state(&self) -> CurationState {
        match self {
            Self::Completed => CurationState::Done,
            Self::Skipped(_) | Self::Blocked(_) => CurationState::Skipped,
            Self::Failed(_) => CurationState::Aborted,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Summary of one curation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationReport {
    /// Member screen name.
    pub screen_name: String,
    /// Final result.
    pub outcome: CurationOutcome,
    /// Pages fetched.
    pub pages: usize,
    /// Items fetched.
    pub fetched: usize,
    /// Items newly stored.
    pub saved: usize,
    /// States visited, in order.
    pub states: Vec<CurationState>,
    /// Wall clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CurationReport {
    /// Creates an empty report.
    pub fn new(screen_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            outcome: CurationOutcome::Completed,
            pages: 0,
            fetched: 0,
            saved: 0,
            states: vec![CurationState::Idle],
            duration_ms: 0,
        }
    }

    /// Returns true for completed and skipped attempts.
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Records a visited state.
    pub fn enter(&mut self, state: CurationState) {
        self.states.push(state);
    }

    /// Sets the outcome, its terminal state and the duration.
    pub fn finish(&mut self, outcome: CurationOutcome, elapsed: Duration) {
        let terminal = outcome.terminal_state();
        if self.states.last() != Some(&terminal) {
            self.states.push(terminal);
        }
        self.outcome = outcome;
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Returns true if the attempt went through `state`.
    pub fn visited(&self, state: CurationState) -> bool {
        self.states.contains(&state)
    }
}
