//! Fetch error types.

use chrono::{DateTime, Utc};
use curator_core::MemberAvailability;
use thiserror::Error;

// ============================================================================
// Remote Error Codes
// ============================================================================

/// Error codes reported in `{"errors":[{"code":..}]}` bodies.
pub mod codes {
    /// Could not authenticate you.
    pub const COULD_NOT_AUTHENTICATE: u32 = 32;
    /// No user matches the query.
    pub const USER_NOT_FOUND: u32 = 34;
    /// User not found.
    pub const NOT_FOUND: u32 = 50;
    /// Empty reply from the server.
    pub const EMPTY_REPLY: u32 = 52;
    /// User has been suspended.
    pub const SUSPENDED_USER: u32 = 63;
    /// Your account is suspended.
    pub const SUSPENDED_ACCOUNT: u32 = 64;
    /// Rate limit exceeded.
    pub const EXCEEDED_RATE_LIMIT: u32 = 88;
    /// Invalid or expired token.
    pub const INVALID_TOKEN: u32 = 89;
    /// Over capacity.
    pub const OVER_CAPACITY: u32 = 130;
    /// Internal error.
    pub const INTERNAL_ERROR: u32 = 131;
    /// No status found with that id.
    pub const NO_STATUS_FOUND: u32 = 144;
    /// Not authorized to see this status.
    pub const NOT_AUTHORIZED_TO_SEE: u32 = 179;
    /// Bad authentication data.
    pub const BAD_AUTHENTICATION: u32 = 215;
    /// Protected account.
    pub const PROTECTED_ACCOUNT: u32 = 2048;
}

// ============================================================================
// API Error
// ============================================================================

/// Classified error returned by the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The token exhausted its calls for the endpoint.
    #[error("Rate limit exceeded")]
    RateLimited {
        /// When the window resets, if reported.
        reset_at: Option<DateTime<Utc>>,
    },

    /// The token was rejected.
    #[error("Bad authentication: {message}")]
    BadAuthentication {
        /// Remote error code.
        code: Option<u32>,
        /// Remote message.
        message: String,
    },

    /// The member account is suspended.
    #[error("Suspended account: {0}")]
    Suspended(String),

    /// The member account is protected.
    #[error("Protected account: {0}")]
    Protected(String),

    /// The member account does not exist.
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// The requested item does not exist.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// The remote service is overloaded.
    #[error("Over capacity: {message}")]
    OverCapacity {
        /// Remote error code.
        code: Option<u32>,
        /// Remote message.
        message: String,
    },

    /// The server closed the connection without a reply.
    #[error("Empty reply")]
    EmptyReply,

    /// Transport level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// The body could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Anything else.
    #[error("Unexpected API error (status {status}, code {code:?}): {message}")]
    Unknown {
        /// HTTP status.
        status: u16,
        /// Remote error code.
        code: Option<u32>,
        /// Remote message.
        message: String,
    },
}

impl ApiError {
    /// Classifies a remote error code.
    pub fn from_code(code: u32, message: impl Into<String>, status: u16) -> Self {
        let message = message.into();
        match code {
            codes::EXCEEDED_RATE_LIMIT => Self::RateLimited { reset_at: None },
            codes::BAD_AUTHENTICATION | codes::INVALID_TOKEN | codes::COULD_NOT_AUTHENTICATE => {
                Self::BadAuthentication {
                    code: Some(code),
                    message,
                }
            }
            codes::SUSPENDED_USER | codes::SUSPENDED_ACCOUNT => Self::Suspended(message),
            codes::NOT_AUTHORIZED_TO_SEE | codes::PROTECTED_ACCOUNT => Self::Protected(message),
            codes::USER_NOT_FOUND | codes::NOT_FOUND => Self::MemberNotFound(message),
            codes::NO_STATUS_FOUND => Self::ItemNotFound(message),
            codes::OVER_CAPACITY | codes::INTERNAL_ERROR => Self::OverCapacity {
                code: Some(code),
                message,
            },
            codes::EMPTY_REPLY => Self::EmptyReply,
            _ => Self::Unknown {
                status,
                code: Some(code),
                message,
            },
        }
    }

    /// Returns true for rate limit errors.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns true when the token itself was rejected.
    pub fn is_bad_authentication(&self) -> bool {
        matches!(self, Self::BadAuthentication { .. })
    }

    /// Returns true when retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::OverCapacity { .. } | Self::EmptyReply => true,
            Self::Http(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Reset instant of a rate limit error.
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::RateLimited { reset_at } => *reset_at,
            _ => None,
        }
    }

    /// Member reachability implied by the error, if any.
    pub fn member_availability(&self) -> Option<MemberAvailability> {
        match self {
            Self::Suspended(_) => Some(MemberAvailability::Suspended),
            Self::Protected(_) => Some(MemberAvailability::Protected),
            Self::MemberNotFound(_) => Some(MemberAvailability::NotFound),
            _ => None,
        }
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Timeout.
    #[error("Request timed out")]
    Timeout,

    /// The request could not be signed.
    #[error("Signature error: {0}")]
    Signature(String),
}

impl HttpError {
    /// Returns true for connection failures and timeouts.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(err) => err.is_connect() || err.is_timeout(),
            Self::Timeout => true,
            Self::InvalidUrl(_) | Self::Signature(_) => false,
        }
    }
}
