//! Config command - manage configuration.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use curator_store::{Config, default_config_dir};
use tracing::info;

use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,

    /// Write a configuration file with every default filled in.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and data paths.
    Path,
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli, config: &Config) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(config, cli),
        ConfigAction::Init { force } => init_config(cli, *force),
        ConfigAction::Path => show_paths(config, cli),
    }
}

fn show_config(config: &Config, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            println!("Curator Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Log level:          {}", config.general.log_level);
            println!("API base URL:       {}", config.api.base_url);
            println!("Request timeout:    {}s", config.api.timeout_secs);
            println!("Max attempts:       {}", config.api.max_retries);
            println!(
                "Consumer key:       {}",
                if config.consumer().is_some() { "set" } else { "not set" }
            );
            println!("Freeze window:      {} min", config.rate_limit.freeze_minutes);
            println!("Update window:      {} h", config.curation.update_window_hours);
            println!("Page size:          {}", config.curation.page_size);
            println!("Pages per attempt:  {}", config.curation.max_pages_per_attempt);
            println!("Greedy:             {}", config.curation.greedy);
            println!("Whisperer window:   {} days", config.curation.whisperer_window_days);
            println!("Workers:            {}", config.curation.workers);
            println!("Data dir:           {}", config.storage.data_dir().display());
        }
        OutputFormat::Json => {
            // Secrets stay out of the output.
            let mut redacted = config.clone();
            redacted.api.consumer_secret = redacted.api.consumer_secret.map(|_| "********".into());
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&redacted)?);
        }
    }

    Ok(())
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default().save_to(&path)?;
    info!(path = %path.display(), "Configuration initialized");
    println!("Wrote {}", path.display());
    Ok(())
}

fn show_paths(config: &Config, cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let config_file = cli.config.clone().unwrap_or_else(Config::default_path);
    let tokens_file = config.storage.tokens_path();
    let curation_file = config.storage.curation_path();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:     {}", config_dir.display());
            println!("Config file:    {}", config_file.display());
            println!("Token pool:     {}", tokens_file.display());
            println!("Curation state: {}", curation_file.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": config_file.display().to_string(),
                "tokens_file": tokens_file.display().to_string(),
                "curation_file": curation_file.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}
