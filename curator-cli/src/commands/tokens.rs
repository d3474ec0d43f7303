//! Tokens command - manage the token pool.

use anyhow::{Result, bail};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use curator_core::{Token, TokenKind, TokenPool};
use curator_store::Config;
use tracing::info;

use super::Services;
use crate::output::{JsonFormatter, TextFormatter, TokenOutput};
use crate::{Cli, OutputFormat};

/// Arguments for the tokens command.
#[derive(Args)]
pub struct TokensArgs {
    #[command(subcommand)]
    pub action: TokensAction,
}

/// Tokens subcommands.
#[derive(Subcommand)]
pub enum TokensAction {
    /// List the pool with freeze deadlines.
    List,

    /// Add a token to the pool.
    Add {
        /// Access token.
        access_token: String,

        /// Access token secret.
        access_token_secret: String,

        /// Consumer key, overriding the configured one.
        #[arg(long, requires = "consumer_secret")]
        consumer_key: Option<String>,

        /// Consumer secret, overriding the configured one.
        #[arg(long, requires = "consumer_key")]
        consumer_secret: Option<String>,

        /// Application-only token sent as a bearer token.
        #[arg(long)]
        application: bool,
    },

    /// Freeze a token.
    Freeze {
        /// Access token.
        access_token: String,

        /// Minutes to freeze for (defaults to `rate_limit.freeze_minutes`).
        #[arg(long)]
        minutes: Option<i64>,
    },

    /// Make a frozen token usable again.
    Unfreeze {
        /// Access token.
        access_token: String,
    },

    /// Remove a token from the pool.
    Remove {
        /// Access token.
        access_token: String,
    },
}

/// Runs the tokens command.
pub async fn run(args: &TokensArgs, cli: &Cli, config: &Config) -> Result<()> {
    let services = Services::open(config).await?;
    let pool = services.tokens.as_ref();

    match &args.action {
        TokensAction::List => list_tokens(pool, cli).await,
        TokensAction::Add {
            access_token,
            access_token_secret,
            consumer_key,
            consumer_secret,
            application,
        } => {
            let mut token = Token::new(access_token, access_token_secret);
            if let (Some(key), Some(secret)) = (consumer_key, consumer_secret) {
                token = token.with_consumer(key, secret);
            }
            if *application {
                token = token.with_kind(TokenKind::Application);
            }
            let token = pool.ensure_token(token).await?;
            info!(token = token.prefix(), "Token added");
            println!("Added: {}", token.prefix());
            Ok(())
        }
        TokensAction::Freeze { access_token, minutes } => {
            let minutes = minutes.unwrap_or(config.rate_limit.freeze_minutes);
            if minutes <= 0 {
                bail!("Freeze duration must be positive, got {minutes} minutes");
            }
            let until = Utc::now() + Duration::minutes(minutes);
            pool.freeze(access_token, until).await?;
            println!("Frozen until {}", until.to_rfc3339());
            Ok(())
        }
        TokensAction::Unfreeze { access_token } => {
            pool.unfreeze(access_token).await?;
            println!("Unfrozen");
            Ok(())
        }
        TokensAction::Remove { access_token } => {
            if pool.remove(access_token).await? {
                println!("Removed");
                Ok(())
            } else {
                bail!("Unknown token");
            }
        }
    }
}

async fn list_tokens(pool: &curator_store::TokenStore, cli: &Cli) -> Result<()> {
    let tokens = pool.tokens().await?;
    let now = Utc::now();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_tokens(&tokens, now));
        }
        OutputFormat::Json => {
            let outputs: Vec<TokenOutput> = tokens.iter().map(|token| TokenOutput::new(token, now)).collect();
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&outputs)?);
        }
    }
    Ok(())
}
