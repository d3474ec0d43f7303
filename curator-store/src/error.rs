//! Store error types.

use curator_core::CoreError;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Token not found.
    #[error("Token not found: {0}")]
    TokenNotFound(String),

    /// Member not found.
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// Publishers list not found.
    #[error("Publishers list not found: {0}")]
    ListNotFound(u64),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MemberNotFound(screen_name) => CoreError::MemberNotFound(screen_name),
            StoreError::Serialization(err) => CoreError::Serialization(err),
            other => CoreError::Storage(other.to_string()),
        }
    }
}
