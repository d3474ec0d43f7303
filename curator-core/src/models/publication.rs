//! Publication types.
//!
//! - [`PublicationId`] - Decimal big-integer identifier
//! - [`Publication`] - A fetched item (tweet or liked tweet)
//! - [`PublicationKind`] - Which timeline an item was collected from

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// Publication Id
// ============================================================================

/// Identifier of a publication.
///
/// Remote ids exceed 2^53, so they are carried as normalised decimal strings
/// and compared numerically without ever going through floating point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicationId(String);

impl PublicationId {
    /// Parses a decimal id, dropping leading zeros.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidId(raw.to_string()));
        }

        Ok(Self::from_digits(trimmed))
    }

    fn from_digits(digits: &str) -> Self {
        let significant = digits.trim_start_matches('0');
        if significant.is_empty() {
            Self("0".to_string())
        } else {
            Self(significant.to_string())
        }
    }

    /// Returns the decimal representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the id `0`.
    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    /// Returns `self - 1`, or `None` for zero.
    pub fn predecessor(&self) -> Option<Self> {
        if self.is_zero() {
            return None;
        }

        let mut digits = self.0.as_bytes().to_vec();
        for digit in digits.iter_mut().rev() {
            if *digit == b'0' {
                *digit = b'9';
            } else {
                *digit -= 1;
                break;
            }
        }

        let text: String = digits.into_iter().map(char::from).collect();
        Some(Self::from_digits(&text))
    }

    /// Returns `self + 1`.
    pub fn successor(&self) -> Self {
        let mut digits = self.0.as_bytes().to_vec();
        let mut carry = true;
        for digit in digits.iter_mut().rev() {
            if *digit == b'9' {
                *digit = b'0';
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }

        Self(digits.into_iter().map(char::from).collect())
    }
}

impl Ord for PublicationId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Both sides are normalised, so a longer string is a larger number.
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for PublicationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for PublicationId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PublicationId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PublicationId> for String {
    fn from(id: PublicationId) -> Self {
        id.0
    }
}

impl From<u64> for PublicationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for PublicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Publication Kind
// ============================================================================

/// Which member timeline a publication was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublicationKind {
    /// Items authored by the member.
    #[default]
    Statuses,
    /// Items liked by the member.
    Likes,
}

impl PublicationKind {
    /// Returns a human-readable label (plural).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Statuses => "statuses",
            Self::Likes => "likes",
        }
    }
}

impl fmt::Display for PublicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Publication
// ============================================================================

/// A publication fetched from the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Remote identifier.
    pub id: PublicationId,
    /// Screen name of the author.
    pub screen_name: String,
    /// Full text.
    pub text: String,
    /// Publication date, when the API reported a parseable one.
    pub created_at: Option<DateTime<Utc>>,
    /// Raw document as returned by the API.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Publication {
    /// Creates a publication without a raw document.
    pub fn new(id: PublicationId, screen_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            screen_name: screen_name.into(),
            text: text.into(),
            created_at: None,
            raw: serde_json::Value::Null,
        }
    }

    /// Sets the publication date.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Returns true when the item was published strictly before `cutoff`.
    ///
    /// Items without a date are kept.
    pub fn published_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at.is_none_or(|at| at < cutoff)
    }
}

// ============================================================================
// Tests
// ============================================================================
