//! Core error types for the curator.

use thiserror::Error;

/// Core error type shared by the collaborator traits.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No member is recorded under this screen name.
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// A uniqueness constraint was violated (concurrent curators racing).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A publication id is not a decimal integer.
    #[error("Invalid publication id: {0:?}")]
    InvalidId(String),

    /// Invalid data handed to a collaborator.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
