//! Curate command - one attempt for one member.

use anyhow::Result;
use clap::Args;
use curator_core::CurationSelectors;
use curator_store::Config;

use super::{SelectorArgs, Services, cancel_on_ctrl_c};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, Incomplete, OutputFormat};

/// Arguments for the curate command.
#[derive(Args)]
pub struct CurateArgs {
    /// Screen name of the member.
    pub screen_name: String,

    /// Publishers list the member belongs to (locked during the attempt).
    #[arg(long)]
    pub list: Option<u64>,

    /// Resume from a pagination cursor.
    #[arg(long)]
    pub cursor: Option<String>,

    #[command(flatten)]
    pub selectors: SelectorArgs,
}

impl CurateArgs {
    fn selectors(&self) -> CurationSelectors {
        let mut selectors = self.selectors.apply(&CurationSelectors::new(self.screen_name.trim()));
        if let Some(list_id) = self.list {
            selectors = selectors.with_list(list_id);
        }
        if let Some(cursor) = &self.cursor {
            selectors = selectors.with_cursor(cursor.clone());
        }
        selectors
    }
}

/// Runs the curate command.
pub async fn run(args: &CurateArgs, cli: &Cli, config: &Config) -> Result<()> {
    let services = Services::open(config).await?;
    let mut engine = services.engine_builder(cancel_on_ctrl_c())?.build()?;

    let report = engine.curate(&args.selectors()).await;

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                let formatter = TextFormatter::new(!cli.no_color);
                println!("{}", formatter.format_report(&report));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&report)?);
        }
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(Incomplete {
            unsuccessful: 1,
            attempts: 1,
        }
        .into())
    }
}
