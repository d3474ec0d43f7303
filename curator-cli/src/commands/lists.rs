//! Lists command - manage publishers lists.

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use curator_core::{PublishersList, PublishersListRepository};
use curator_store::Config;
use tracing::{info, warn};

use super::Services;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the lists command.
#[derive(Args)]
pub struct ListsArgs {
    #[command(subcommand)]
    pub action: ListsAction,
}

/// Lists subcommands.
#[derive(Subcommand)]
pub enum ListsAction {
    /// Create or replace a publishers list.
    Add {
        /// List id.
        id: u64,

        /// List name.
        name: String,

        /// Owner screen name.
        #[arg(long)]
        owner: Option<String>,

        /// Member screen names (comma-separated or repeated).
        #[arg(long, short, value_delimiter = ',')]
        member: Vec<String>,
    },

    /// Show one list, or every list.
    Show {
        /// List id.
        id: Option<u64>,
    },

    /// Release the lock of a list left behind by an interrupted curator.
    Unlock {
        /// List id.
        id: u64,
    },
}

/// Runs the lists command.
pub async fn run(args: &ListsArgs, cli: &Cli, config: &Config) -> Result<()> {
    let services = Services::open(config).await?;
    let store = services.store.as_ref();

    match &args.action {
        ListsAction::Add {
            id,
            name,
            owner,
            member,
        } => {
            let mut list = PublishersList::new(*id, name).with_members(member.iter().map(|m| m.trim()));
            if let Some(owner) = owner {
                list = list.with_owner(owner);
            }
            if let Some(existing) = store.find_list(*id).await? {
                if existing.locked {
                    warn!(list = id, "Replacing a locked list keeps it locked");
                }
                list.locked = existing.locked;
                list.locked_at = existing.locked_at;
                list.unlocked_at = existing.unlocked_at;
            }
            let members = list.members.len();
            store.save_list(list).await?;
            info!(list = id, members, "Publishers list saved");
            println!("Saved list {id} with {members} members");
            Ok(())
        }
        ListsAction::Show { id } => {
            let lists = match id {
                Some(id) => vec![
                    store
                        .find_list(*id)
                        .await?
                        .ok_or_else(|| anyhow!("Unknown publishers list: {id}"))?,
                ],
                None => store.lists().await?,
            };
            match cli.format {
                OutputFormat::Text => {
                    let formatter = TextFormatter::new(!cli.no_color);
                    for list in &lists {
                        println!("{}", formatter.format_list(list));
                    }
                }
                OutputFormat::Json => {
                    let formatter = JsonFormatter::new(cli.pretty);
                    println!("{}", formatter.format(&lists)?);
                }
            }
            Ok(())
        }
        ListsAction::Unlock { id } => {
            store.unlock_list(*id).await?;
            println!("Unlocked list {id}");
            Ok(())
        }
    }
}
