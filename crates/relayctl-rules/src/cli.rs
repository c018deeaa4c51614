//! CLI module for custom routing rules.
//!
//! # Usage
//!
//! ```bash
//! # Send a streaming site out directly on an edge node
//! relayctl rule add direct --domain netflix.com,nflxvideo.net
//!
//! # Drop an address range
//! relayctl rule add blackhole --ip 203.0.113.0/24
//!
//! relayctl rule list
//! relayctl rule remove 1
//! ```

use clap::{ArgGroup, Parser, Subcommand};
use relayctl_config::{CustomRule, MatchKind};
use relayctl_engine::ContextArgs;
use tabled::{Table, Tabled};

use crate::engine;
use crate::error::RulesError;
use crate::rule::parse_target;

#[derive(Parser, Debug, Clone)]
#[command(name = "rule", about = "Manage custom routing rules")]
pub struct RuleArgs {
    #[command(subcommand)]
    pub command: RuleCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RuleCommands {
    /// Add a custom rule.
    #[command(group(ArgGroup::new("match").required(true).args(["domain", "ip"])))]
    Add {
        /// Outbound for matching traffic: relay, direct or blackhole.
        outbound: String,

        /// Domain patterns (comma-separated or repeated).
        #[arg(long, num_args = 1..)]
        domain: Vec<String>,

        /// IPs, CIDRs or geoip selectors (comma-separated or repeated).
        #[arg(long, num_args = 1..)]
        ip: Vec<String>,
    },

    /// List custom rules.
    #[command(alias = "ls")]
    List,

    /// Remove a custom rule by its position in `rule list`.
    #[command(alias = "rm")]
    Remove {
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Match")]
    kind: String,
    #[tabled(rename = "Values")]
    values: String,
    #[tabled(rename = "Outbound")]
    outbound: String,
}

/// Match values, followed by any further predicates the rule carries.
fn describe_values(rule: &CustomRule) -> String {
    let mut out = rule.values.join(", ");
    for (key, value) in &rule.extra {
        out.push_str(&format!(" [{key}={value}]"));
    }
    out
}

pub async fn run(ctx: &ContextArgs, args: RuleArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        RuleCommands::Add {
            outbound,
            domain,
            ip,
        } => {
            let (kind, values) = if domain.is_empty() {
                (MatchKind::Ip, ip)
            } else {
                (MatchKind::Domain, domain)
            };
            let rc = ctx.context();
            let commit = rc
                .commit::<_, RulesError, _>(|doc| {
                    let target = parse_target(&outbound, doc.role())?;
                    engine::add(doc, target, kind, &values)
                })
                .await?;
            println!("Added rule {} ({kind} -> {outbound})", commit.value);
        }
        RuleCommands::List => {
            let doc = ctx.store().read()?;
            let rules = engine::list(&doc);
            if rules.is_empty() {
                println!("No custom rules.");
                return Ok(());
            }
            let rows: Vec<RuleRow> = rules
                .iter()
                .enumerate()
                .map(|(i, r)| RuleRow {
                    index: i + 1,
                    kind: r.kind.to_string(),
                    values: describe_values(r),
                    outbound: r.outbound_tag.clone(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        RuleCommands::Remove { index } => {
            let rc = ctx.context();
            let commit = rc
                .commit::<_, RulesError, _>(|doc| engine::remove(doc, index))
                .await?;
            let r = commit.value;
            println!(
                "Removed rule {index} ({} {} -> {})",
                r.kind,
                r.values.join(","),
                r.outbound_tag
            );
        }
    }
    Ok(())
}
