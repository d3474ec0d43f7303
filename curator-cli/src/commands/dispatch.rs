//! Dispatch command - publishers list to work-queue messages.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use curator_core::CurationSelectors;
use curator_engine::ListDispatcher;
use curator_store::Config;
use tracing::info;

use super::{SelectorArgs, Services};
use crate::Cli;

/// Arguments for the dispatch command.
#[derive(Args)]
pub struct DispatchArgs {
    /// Publishers list id.
    pub list_id: u64,

    /// Only dispatch the member with this screen name.
    #[arg(long)]
    pub only: Option<String>,

    /// Write the messages to a file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub selectors: SelectorArgs,
}

/// Runs the dispatch command.
///
/// Messages are always JSON lines, whatever the output format.
pub async fn run(args: &DispatchArgs, _cli: &Cli, config: &Config) -> Result<()> {
    let services = Services::open(config).await?;
    let dispatcher = ListDispatcher::new(services.store.clone());

    let template = args.selectors.apply(&CurationSelectors::new(""));
    let messages = dispatcher
        .messages_for_list(args.list_id, &template, args.only.as_deref())
        .await?;

    let mut lines = String::new();
    for message in &messages {
        lines.push_str(&serde_json::to_string(message)?);
        lines.push('\n');
    }

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, lines)
                .await
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!(path = %path.display(), messages = messages.len(), "Work queue written");
        }
        None => print!("{lines}"),
    }

    Ok(())
}
