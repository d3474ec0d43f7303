// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Curator CLI - collects member timelines through a pool of tokens.
//!
//! # Examples
//!
//! ```bash
//! # Curate one member
//! curator curate pierrec
//!
//! # Curate the likes of a member of publishers list 7
//! curator curate pierrec --list 7 --likes
//!
//! # Turn a publishers list into work-queue messages, then consume them
//! curator dispatch 7 > queue.jsonl
//! curator consume queue.jsonl --workers 8
//!
//! # Register a token
//! curator tokens add <access-token> <access-secret>
//!
//! # JSON output
//! curator --format json --pretty tokens list
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use curator_store::{Config, StoreError};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, consume, curate, dispatch, lists, tokens};

// ============================================================================
// CLI Definition
// ============================================================================

/// Curator CLI - timeline curation through a rate-limited API.
#[derive(Parser)]
#[command(name = "curator")]
#[command(about = "Collects member timelines through a pool of OAuth tokens")]
#[command(long_about = r"
Curator collects the publications of members into a local store, rotating
through a pool of access tokens as their rate limits run out.

Examples:
  curator curate pierrec             # One member
  curator dispatch 7 > queue.jsonl   # One message per list member
  curator consume queue.jsonl        # Curate every queued member
  curator tokens list                # Token pool and freeze deadlines
")]
#[command(version)]
#[command(author = "Revue de presse contributors")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Configuration file (defaults to the platform config directory).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Curate the timeline of one member.
    #[command(visible_alias = "c")]
    Curate(curate::CurateArgs),

    /// Curate every member named by a file of work-queue messages.
    Consume(consume::ConsumeArgs),

    /// Write one work-queue message per member of a publishers list.
    #[command(visible_alias = "d")]
    Dispatch(dispatch::DispatchArgs),

    /// Manage the token pool.
    #[command(visible_alias = "t")]
    Tokens(tokens::TokensArgs),

    /// Manage publishers lists.
    #[command(visible_alias = "l")]
    Lists(lists::ListsArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Invalid configuration.
    ConfigError = 2,
    /// At least one attempt did not complete.
    Incomplete = 3,
}

/// Error raised when curation attempts ended blocked or failed.
#[derive(Debug, thiserror::Error)]
#[error("{unsuccessful} of {attempts} curation attempts did not complete")]
pub struct Incomplete {
    /// Attempts that did not succeed.
    pub unsuccessful: usize,
    /// Attempts made.
    pub attempts: usize,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, level: &str) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, StoreError> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e}");
            }
            std::process::exit(ExitCode::ConfigError as i32);
        }
    };

    setup_logging(cli.verbose, cli.quiet, &config.general.log_level);

    let result: Result<()> = match &cli.command {
        Commands::Curate(args) => curate::run(args, &cli, &config).await,
        Commands::Consume(args) => consume::run(args, &cli, &config).await,
        Commands::Dispatch(args) => dispatch::run(args, &cli, &config).await,
        Commands::Tokens(args) => tokens::run(args, &cli, &config).await,
        Commands::Lists(args) => lists::run(args, &cli, &config).await,
        Commands::Config(args) => config::run(args, &cli, &config),
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        let code = if e.downcast_ref::<Incomplete>().is_some() {
            ExitCode::Incomplete
        } else if matches!(e.downcast_ref::<StoreError>(), Some(StoreError::Config(_))) {
            ExitCode::ConfigError
        } else {
            ExitCode::Error
        };
        std::process::exit(code as i32);
    }
}
