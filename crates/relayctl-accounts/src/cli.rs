//! CLI module for relay accounts.
//!
//! # Usage
//!
//! ```bash
//! # Add an account with a generated secret
//! relayctl account add alice
//!
//! # List accounts
//! relayctl account list --format json
//!
//! # Client link
//! relayctl account link alice --host 203.0.113.7
//!
//! # Remove an account
//! relayctl account remove alice
//! ```

use clap::{Parser, Subcommand};
use relayctl_engine::ContextArgs;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::error::AccountError;
use crate::link::share_link_for;
use crate::registry;

#[derive(Parser, Debug, Clone)]
#[command(name = "account", about = "Manage relay accounts")]
pub struct AccountArgs {
    #[command(subcommand)]
    pub command: AccountCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AccountCommands {
    /// Add an account to every listener.
    Add {
        identifier: String,

        /// Account secret (generated when omitted).
        #[arg(long)]
        secret: Option<String>,
    },

    /// Remove an account from every listener.
    #[command(alias = "rm")]
    Remove { identifier: String },

    /// List accounts.
    #[command(alias = "ls")]
    List {
        /// Output format (table, json).
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Print secrets instead of masking them.
        #[arg(long)]
        show_secrets: bool,
    },

    /// Print a client share link.
    Link {
        identifier: String,

        /// Public address of this node; repeat to give fallbacks.
        #[arg(long = "host", required = true)]
        hosts: Vec<String>,
    },
}

#[derive(Tabled, Serialize)]
struct AccountRow {
    #[tabled(rename = "#")]
    #[serde(skip)]
    index: usize,
    #[tabled(rename = "Identifier")]
    identifier: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Secret")]
    secret: String,
}

pub async fn run(ctx: &ContextArgs, args: AccountArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        AccountCommands::Add { identifier, secret } => {
            let rc = ctx.context();
            let commit = rc
                .commit::<_, AccountError, _>(|doc| {
                    registry::add(doc, &identifier, secret.as_deref())
                })
                .await?;
            let account = commit.value;
            println!("Added account '{}'", account.identifier);
            println!("Secret: {}", account.secret);
        }
        AccountCommands::Remove { identifier } => {
            let rc = ctx.context();
            let commit = rc
                .commit::<_, AccountError, _>(|doc| {
                    let removed = registry::remove(doc, &identifier)?;
                    Ok((removed, doc.accounts.len()))
                })
                .await?;
            let (removed, remaining) = commit.value;
            println!("Removed account '{}'", removed.identifier);
            if remaining == 0 {
                eprintln!(
                    "Warning: no accounts remain; every client is locked out until one is added."
                );
            }
        }
        AccountCommands::List {
            format,
            show_secrets,
        } => {
            let doc = ctx.store().read()?;
            let rows: Vec<AccountRow> = registry::list(&doc)?
                .iter()
                .enumerate()
                .map(|(i, a)| AccountRow {
                    index: i + 1,
                    identifier: a.identifier.clone(),
                    method: a.method.clone(),
                    secret: if show_secrets {
                        a.secret.clone()
                    } else {
                        mask(&a.secret)
                    },
                })
                .collect();
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
                _ => {
                    if rows.is_empty() {
                        println!("No accounts.");
                    } else {
                        println!("{}", Table::new(rows));
                    }
                }
            }
        }
        AccountCommands::Link { identifier, hosts } => {
            let doc = ctx.store().read()?;
            println!("{}", share_link_for(&doc, &identifier, &hosts)?);
        }
    }
    Ok(())
}

fn mask(secret: &str) -> String {
    let shown: String = secret.chars().take(4).collect();
    format!("{shown}{}", "*".repeat(secret.chars().count().saturating_sub(4).min(12)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_hides_tail() {
        assert_eq!(mask("abcdefgh"), "abcd****");
        assert_eq!(mask("ab"), "ab");
        assert_eq!(mask(&"x".repeat(40)), format!("xxxx{}", "*".repeat(12)));
    }

    #[test]
    fn parse_link_hosts() {
        let args = AccountArgs::try_parse_from([
            "account", "link", "alice", "--host", "127.0.0.1", "--host", "1.2.3.4",
        ])
        .unwrap();
        match args.command {
            AccountCommands::Link { identifier, hosts } => {
                assert_eq!(identifier, "alice");
                assert_eq!(hosts, ["127.0.0.1", "1.2.3.4"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn link_requires_host() {
        assert!(AccountArgs::try_parse_from(["account", "link", "alice"]).is_err());
    }
}
