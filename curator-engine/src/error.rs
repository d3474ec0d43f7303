//! Engine error types.

use curator_core::CoreError;
use curator_fetch::ApiError;
use thiserror::Error;

/// Errors that end a curation attempt.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The extremum of a member could not be recorded.
    #[error("Extremum of {screen_name} not recorded after {attempts} attempts")]
    ExtremumRetriesExhausted {
        /// Member screen name.
        screen_name: String,
        /// Attempts made.
        attempts: u32,
    },

    /// A publishers list does not exist.
    #[error("Publishers list not found: {0}")]
    ListNotFound(u64),

    /// A required collaborator was not provided to the builder.
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// Storage error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Remote API error.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl EngineError {
    /// Returns true for duplicate-key style races between curators.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Core(CoreError::ConstraintViolation(_)))
    }
}
