//! Consume command - curates every member named by a work queue.
//!
//! The queue is a file (or stdin) of [`FetchPublicationMessage`] JSON lines.
//! Attempts run on a bounded number of concurrent workers, each with its own
//! engine. Members skipped because another worker held their publishers list
//! are queued again for the next round.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use curator_core::{CurationSelectors, FetchPublicationMessage};
use curator_engine::{CurationEngineBuilder, CurationOutcome, CurationReport, EngineError, SkipReason};
use curator_store::Config;
use futures::{StreamExt, stream};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use super::{Services, cancel_on_ctrl_c};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, Incomplete, OutputFormat};

/// Arguments for the consume command.
#[derive(Args)]
pub struct ConsumeArgs {
    /// File of JSON lines messages ("-" or nothing reads stdin).
    pub input: Option<PathBuf>,

    /// Concurrent attempts (defaults to `curation.workers`).
    #[arg(long, short)]
    pub workers: Option<usize>,
}

/// Runs the consume command.
pub async fn run(args: &ConsumeArgs, cli: &Cli, config: &Config) -> Result<()> {
    let raw = read_input(args.input.as_ref()).await?;
    let messages = parse_messages(&raw);
    if messages.is_empty() {
        info!("Work queue is empty");
        return Ok(());
    }

    let services = Services::open(config).await?;
    let cancel = cancel_on_ctrl_c();
    let builder = services.engine_builder(cancel.clone())?;
    let workers = args.workers.unwrap_or(config.curation.workers).max(1);

    let mut pending: Vec<CurationSelectors> = messages.into_iter().map(CurationSelectors::from).collect();
    let mut reports = Vec::with_capacity(pending.len());
    let mut round = 0;

    while !pending.is_empty() && !cancel.is_cancelled() {
        round += 1;
        let queued = pending.len();
        info!(round, queued, workers, "Starting curation round");

        let results = curate_all(&builder, std::mem::take(&mut pending), workers).await?;

        let mut locked = Vec::new();
        for (selectors, report) in results {
            if report.outcome == CurationOutcome::Skipped(SkipReason::ListLocked) {
                pending.push(selectors);
                locked.push(report);
            } else {
                reports.push(report);
            }
        }

        if pending.len() == queued {
            warn!(round, locked = queued, "Every remaining publishers list is locked, giving up");
            reports.append(&mut locked);
            break;
        }
        if cancel.is_cancelled() {
            reports.append(&mut locked);
        }
    }

    print_reports(&reports, cli)?;

    let unsuccessful = reports.iter().filter(|report| !report.is_success()).count();
    if unsuccessful > 0 {
        return Err(Incomplete {
            unsuccessful,
            attempts: reports.len(),
        }
        .into());
    }
    Ok(())
}

async fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read work queue {}", path.display())),
        _ => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            Ok(raw)
        }
    }
}

/// Parses JSON lines, skipping blank and malformed ones.
pub fn parse_messages(raw: &str) -> Vec<FetchPublicationMessage> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str(line) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(line = index + 1, error = %e, "Ignoring malformed message");
                None
            }
        })
        .collect()
}

async fn curate_all(
    builder: &CurationEngineBuilder,
    queue: Vec<CurationSelectors>,
    workers: usize,
) -> Result<Vec<(CurationSelectors, CurationReport)>, EngineError> {
    let results: Vec<Result<_, EngineError>> = stream::iter(queue)
        .map(|selectors| {
            let builder = builder.clone();
            async move {
                let mut engine = builder.build()?;
                let report = engine.curate(&selectors).await;
                Ok::<_, EngineError>((selectors, report))
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    results.into_iter().collect()
}

fn print_reports(reports: &[CurationReport], cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            let formatter = TextFormatter::new(!cli.no_color);
            for report in reports {
                println!("{}", formatter.format_report(report));
            }
            println!();
            println!("{}", formatter.format_summary(reports));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_summary(reports)?);
        }
    }
    Ok(())
}
