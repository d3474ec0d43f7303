//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use curator_core::{Token, TokenKind};
use curator_engine::CurationReport;
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a pool token. Secrets are never serialized.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOutput {
    pub prefix: String,
    pub kind: TokenKind,
    pub frozen: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_until: Option<DateTime<Utc>>,
    pub has_consumer: bool,
}

impl TokenOutput {
    /// Builds the output of `token` as of `now`.
    pub fn new(token: &Token, now: DateTime<Utc>) -> Self {
        let frozen = token.is_frozen_at(now);
        Self {
            prefix: token.prefix().to_string(),
            kind: token.kind,
            frozen,
            frozen_until: token.frozen_until.filter(|_| frozen),
            has_consumer: token.consumer_key.is_some(),
        }
    }
}

/// Totals over several attempts, with their reports.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutput<'a> {
    pub attempts: usize,
    pub completed: usize,
    pub skipped: usize,
    pub blocked: usize,
    pub failed: usize,
    pub saved: usize,
    pub reports: &'a [CurationReport],
}

impl<'a> SummaryOutput<'a> {
    /// Counts the outcomes of `reports`.
    pub fn new(reports: &'a [CurationReport]) -> Self {
        let count = |label: &str| {
            reports
                .iter()
                .filter(|report| report.outcome.label() == label)
                .count()
        };
        Self {
            attempts: reports.len(),
            completed: count("completed"),
            skipped: count("skipped"),
            blocked: count("blocked"),
            failed: count("failed"),
            saved: reports.iter().map(|report| report.saved).sum(),
            reports,
        }
    }
}

// ============================================================================
// Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats totals over several attempts.
    pub fn format_summary(&self, reports: &[CurationReport]) -> Result<String> {
        self.format(&SummaryOutput::new(reports))
    }
}
