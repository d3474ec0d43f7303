//! Text output formatting with colors.

use chrono::{DateTime, Local, Utc};
use curator_core::{PublishersList, Token, TokenKind};
use curator_engine::{BlockReason, CurationOutcome, CurationReport, FailureReason, SkipReason};
use curator_fetch::backoff::describe_wait;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    name_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            name_width: 16,
        }
    }

    /// Formats one attempt on a single line.
    pub fn format_report(&self, report: &CurationReport) -> String {
        let name = format!("{:<width$}", report.screen_name, width = self.name_width);
        let status = self.color_for_outcome(&report.outcome, &format!("{:<9}", report.outcome.label()));

        let detail = match &report.outcome {
            CurationOutcome::Completed => format!(
                "{} pages, {} fetched, {} saved",
                report.pages, report.fetched, report.saved
            ),
            outcome => describe_outcome(outcome),
        };

        format!(
            "{} {} {} {}",
            self.bold(&name),
            status,
            detail,
            self.dim(&format_duration(report.duration_ms))
        )
    }

    /// Formats totals over several attempts.
    pub fn format_summary(&self, reports: &[CurationReport]) -> String {
        let count = |label: &str| {
            reports
                .iter()
                .filter(|report| report.outcome.label() == label)
                .count()
        };
        let saved: usize = reports.iter().map(|report| report.saved).sum();

        let mut lines = vec![self.bold("Curation Summary"), "─".repeat(40)];
        lines.push(format!("Attempts:  {}", reports.len()));
        lines.push(format!("Completed: {}", self.green(&count("completed").to_string())));
        lines.push(format!("Skipped:   {}", count("skipped")));
        lines.push(format!("Blocked:   {}", self.yellow(&count("blocked").to_string())));
        lines.push(format!("Failed:    {}", self.red(&count("failed").to_string())));
        lines.push(format!("Saved:     {saved}"));
        lines.join("\n")
    }

    /// Formats the token pool, one token per line. Secrets are never shown.
    pub fn format_tokens(&self, tokens: &[Token], now: DateTime<Utc>) -> String {
        if tokens.is_empty() {
            return self.dim("No tokens in the pool");
        }

        tokens
            .iter()
            .map(|token| {
                let kind = match token.kind {
                    TokenKind::User => "user",
                    TokenKind::Application => "app",
                };
                let status = if token.is_frozen_at(now) {
                    let seconds = u64::try_from(token.seconds_until_unfrozen(now)).unwrap_or_default();
                    self.yellow(&format!("frozen, {}", describe_wait(seconds)))
                } else {
                    self.green("usable")
                };
                format!("{:<10} {:<5} {}", token.prefix(), kind, status)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Formats a publishers list and its members.
    pub fn format_list(&self, list: &PublishersList) -> String {
        let mut header = format!("#{} {}", list.id, self.bold(&list.name));
        if let Some(owner) = &list.owner_screen_name {
            header.push_str(&format!(" (owner {owner})"));
        }
        if list.locked {
            let since = list
                .locked_at
                .map(|at| at.with_timezone(&Local).format(" since %Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            header.push_str(&format!(" {}", self.red(&format!("locked{since}"))));
        }

        let mut lines = vec![header];
        if list.members.is_empty() {
            lines.push(format!("  {}", self.dim("no members")));
        }
        lines.extend(list.members.iter().map(|member| format!("  • {member}")));
        lines.join("\n")
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_outcome(&self, outcome: &CurationOutcome, text: &str) -> String {
        match outcome {
            CurationOutcome::Completed => self.green(text),
            CurationOutcome::Skipped(_) => self.dim(text),
            CurationOutcome::Blocked(_) => self.yellow(text),
            CurationOutcome::Failed(_) => self.red(text),
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

/// Human-readable reason of an outcome.
pub fn describe_outcome(outcome: &CurationOutcome) -> String {
    match outcome {
        CurationOutcome::Completed => "completed".to_string(),
        CurationOutcome::Skipped(reason) => match reason {
            SkipReason::EmptyScreenName => "no screen name".to_string(),
            SkipReason::MemberUnavailable(availability) => format!("member {}", availability.label()),
            SkipReason::RecentlyCurated => "curated recently".to_string(),
            SkipReason::Whisperer => "whisperer, nothing new".to_string(),
            SkipReason::ListLocked => "publishers list locked".to_string(),
            SkipReason::NothingLeftToCollect => "nothing left to collect".to_string(),
        },
        CurationOutcome::Blocked(reason) => match reason {
            BlockReason::ApiUnavailable => "every token rate limited".to_string(),
            BlockReason::Transient(message) => format!("remote API unavailable: {message}"),
            BlockReason::Cancelled => "interrupted".to_string(),
        },
        CurationOutcome::Failed(reason) => match reason {
            FailureReason::NoTokens => "no token configured".to_string(),
            FailureReason::BadAuthentication => "every token rejected".to_string(),
            FailureReason::RunawayPagination { pages } => format!("pagination did not converge after {pages} pages"),
            FailureReason::ConstraintViolation(message) => format!("constraint violation: {message}"),
            FailureReason::Extremum(message)
            | FailureReason::Storage(message)
            | FailureReason::Unexpected(message) => message.clone(),
            FailureReason::Panicked(message) => format!("panicked: {message}"),
        },
    }
}

fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("({ms}ms)")
    } else {
        #[allow(clippy::cast_precision_loss)]
        let seconds = ms as f64 / 1_000.0;
        format!("({seconds:.1}s)")
    }
}

// ============================================================================
// Tests
// ============================================================================
