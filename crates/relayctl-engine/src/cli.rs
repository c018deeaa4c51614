//! CLI for node setup, settings, service control, statistics, logs and
//! uninstall.
//!
//! # Usage
//!
//! ```bash
//! # Exit node
//! relayctl setup gateway --port 443
//!
//! # Entry node forwarding to it
//! relayctl setup edge --upstream gw.example.net --upstream-port 443 --upstream-secret S3cret
//!
//! relayctl set port relay 8443
//! relayctl set log-level none
//! relayctl stats --user alice
//! relayctl logs --error -n 100
//! ```

use clap::{Args, Subcommand};
use relayctl_config::{
    ConfigDocument, ListenerPorts, UpstreamSpec, build_edge, build_gateway, serialize_document,
    set_listener_port, set_log_level, set_upstream,
};
use relayctl_core::{
    DEFAULT_CONTROL_PORT, DEFAULT_HTTP_PORT, DEFAULT_RELAY_PORT, DEFAULT_SOCKS_PORT, TAG_CONTROL,
    TAG_DIAGNOSTIC_IN, TAG_HTTP_IN, TAG_RELAY_IN, TAG_SOCKS_IN, parse_port,
};
use tabled::{Table, Tabled};
use tracing::warn;

use crate::config::ContextArgs;
use crate::error::EngineError;
use crate::logs::tail_lines;
use crate::stats::{Scope, StatsClient, Traffic, by_scope, format_bytes, traffic_of};

type CliResult = Result<(), Box<dyn std::error::Error>>;

// ── setup ──

#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    #[command(subcommand)]
    pub role: SetupRole,

    /// Replace an existing configuration.
    #[arg(long, global = true)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PortArgs {
    /// Relay-cipher (shadowsocks) listener port.
    #[arg(long = "port", default_value_t = DEFAULT_RELAY_PORT, value_parser = parse_port)]
    pub relay: u16,

    /// HTTP proxy listener port.
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, value_parser = parse_port)]
    pub http_port: u16,

    /// SOCKS listener port.
    #[arg(long, default_value_t = DEFAULT_SOCKS_PORT, value_parser = parse_port)]
    pub socks_port: u16,
}

impl From<&PortArgs> for ListenerPorts {
    fn from(p: &PortArgs) -> Self {
        ListenerPorts {
            relay: p.relay,
            http: p.http_port,
            socks: p.socks_port,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SetupRole {
    /// Exit node with direct egress.
    Gateway(PortArgs),

    /// Entry node forwarding to an upstream relay.
    Edge {
        #[command(flatten)]
        ports: PortArgs,

        /// Upstream relay address (IPv4 or host name).
        #[arg(long)]
        upstream: String,

        /// Upstream relay port.
        #[arg(long, value_parser = parse_port)]
        upstream_port: u16,

        /// Secret of an account on the upstream relay.
        #[arg(long, env = "RELAYCTL_UPSTREAM_SECRET", hide_env_values = true)]
        upstream_secret: String,
    },
}

pub async fn setup(ctx: &ContextArgs, args: SetupArgs) -> CliResult {
    let doc = match args.role {
        SetupRole::Gateway(ref ports) => build_gateway(ports.into())?,
        SetupRole::Edge {
            ref ports,
            upstream,
            upstream_port,
            upstream_secret,
        } => build_edge(
            ports.into(),
            UpstreamSpec {
                address: upstream,
                port: upstream_port,
                secret: upstream_secret,
            },
        )?,
    };

    ctx.context().install(&doc, args.force).await?;

    let seed = &doc.accounts[0];
    println!("Configured {} node at {}", doc.role(), ctx.config.display());
    println!("Seed account: {}", seed.identifier);
    println!("Secret:       {}", seed.secret);
    println!("Client link:  relayctl account link {}", seed.identifier);
    Ok(())
}

// ── set ──

#[derive(Args, Debug, Clone)]
pub struct SetArgs {
    #[command(subcommand)]
    pub command: SetCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SetCommand {
    /// Change a listener's port.
    Port {
        /// Listener: relay, http, socks, diag, or a raw tag.
        listener: String,
        #[arg(allow_negative_numbers = true)]
        port: i64,
    },

    /// Set the engine log level (none, warning, info, debug).
    LogLevel { level: String },

    /// Point an edge node at a different upstream relay.
    Upstream {
        address: String,
        #[arg(allow_negative_numbers = true)]
        port: i64,
        /// New upstream secret; the current one is kept when omitted.
        #[arg(long)]
        secret: Option<String>,
    },
}

/// Map user-facing listener names onto document tags.
pub fn resolve_listener_tag(name: &str) -> &str {
    match name {
        "relay" | "ss" | "shadowsocks" => TAG_RELAY_IN,
        "http" => TAG_HTTP_IN,
        "socks" => TAG_SOCKS_IN,
        "diag" | "diagnostic" => TAG_DIAGNOSTIC_IN,
        "control" => TAG_CONTROL,
        other => other,
    }
}

pub async fn set(ctx: &ContextArgs, args: SetArgs) -> CliResult {
    let rc = ctx.context();
    match args.command {
        SetCommand::Port { listener, port } => {
            let tag = resolve_listener_tag(&listener).to_string();
            let commit = rc
                .commit::<_, EngineError, _>(|doc| Ok(set_listener_port(doc, &tag, port)?))
                .await?;
            if commit.changed {
                println!("{tag}: port set to {port}");
            } else {
                println!("{tag} already listens on {port}; nothing to do");
            }
        }
        SetCommand::LogLevel { level } => {
            let commit = rc
                .commit::<_, EngineError, _>(|doc| Ok(set_log_level(doc, &level)?))
                .await?;
            println!("log level: {}", commit.value);
        }
        SetCommand::Upstream {
            address,
            port,
            secret,
        } => {
            let commit = rc
                .commit::<_, EngineError, _>(|doc| {
                    Ok(set_upstream(doc, &address, port, secret.as_deref())?)
                })
                .await?;
            if commit.changed {
                println!("upstream relay set to {address}:{port}");
            } else {
                println!("upstream relay unchanged");
            }
        }
    }
    Ok(())
}

// ── show ──

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Print the on-disk JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub async fn show(ctx: &ContextArgs, args: ShowArgs) -> CliResult {
    let doc = ctx.store().read()?;
    if args.json {
        print!("{}", String::from_utf8_lossy(&serialize_document(&doc)?));
        return Ok(());
    }
    let rows: Vec<SummaryRow> = doc
        .summary()
        .into_iter()
        .map(|(field, value)| SummaryRow { field, value })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

// ── service ──

#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    #[command(subcommand)]
    pub action: ServiceAction,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Status,
    Enable,
}

pub async fn service(ctx: &ContextArgs, args: ServiceArgs) -> CliResult {
    let rc = ctx.context();
    let svc = rc.service();
    match args.action {
        ServiceAction::Start => {
            // Refuse to start on a document that no longer loads.
            rc.read()?;
            svc.start().await?;
        }
        ServiceAction::Stop => svc.stop().await?,
        ServiceAction::Restart => {
            rc.read()?;
            svc.restart().await?;
        }
        ServiceAction::Enable => svc.enable().await?,
        ServiceAction::Status => {
            println!("{}", svc.status().await?);
            return Ok(());
        }
    }
    println!("{}: {:?} ok", svc.unit(), args.action);
    Ok(())
}

// ── stats ──

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Only show this account.
    #[arg(long)]
    pub user: Option<String>,

    /// Zero the counters after reading them.
    #[arg(long)]
    pub reset: bool,
}

#[derive(Tabled)]
struct TrafficRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Uplink")]
    uplink: String,
    #[tabled(rename = "Downlink")]
    downlink: String,
    #[tabled(rename = "Total")]
    total: String,
}

impl TrafficRow {
    fn new(name: &str, t: Traffic) -> Self {
        Self {
            name: name.to_string(),
            uplink: format_bytes(t.uplink),
            downlink: format_bytes(t.downlink),
            total: format_bytes(t.total()),
        }
    }
}

pub async fn stats(ctx: &ContextArgs, args: StatsArgs) -> CliResult {
    let doc = ctx.store().read()?;
    let client = StatsClient::new(&ctx.engine_bin, control_port(&doc));
    let counters = client.query(args.reset).await?;

    if let Some(user) = args.user {
        if doc.account(&user).is_none() {
            warn!(user = %user, "not a configured account");
        }
        let rows = vec![TrafficRow::new(&user, traffic_of(&counters, Scope::User, &user))];
        println!("{}", Table::new(rows));
        return Ok(());
    }

    for (title, scope) in [("Accounts", Scope::User), ("Listeners", Scope::Inbound)] {
        let rows: Vec<TrafficRow> = by_scope(&counters, scope)
            .iter()
            .map(|(name, t)| TrafficRow::new(name, *t))
            .collect();
        println!("{title}:");
        if rows.is_empty() {
            println!("  (no traffic recorded)");
        } else {
            println!("{}", Table::new(rows));
        }
    }
    if args.reset {
        println!("Counters reset.");
    }
    Ok(())
}

fn control_port(doc: &ConfigDocument) -> u16 {
    doc.listener(TAG_CONTROL)
        .map(|l| l.port)
        .unwrap_or(DEFAULT_CONTROL_PORT)
}

// ── logs ──

#[derive(Args, Debug, Clone)]
pub struct LogsArgs {
    /// Show the error log instead of the access log.
    #[arg(long)]
    pub error: bool,

    /// Number of lines.
    #[arg(short = 'n', long, default_value_t = 50)]
    pub lines: usize,
}

pub async fn logs(ctx: &ContextArgs, args: LogsArgs) -> CliResult {
    let doc = ctx.store().read()?;
    let path = if args.error {
        doc.log.error
    } else {
        doc.log.access
    };
    let path = path.ok_or(EngineError::LoggingDisabled)?;
    for line in tail_lines(&path, args.lines).await? {
        println!("{line}");
    }
    Ok(())
}

// ── uninstall ──

#[derive(Args, Debug, Clone)]
pub struct UninstallArgs {
    /// Confirm removal.
    #[arg(long)]
    pub yes: bool,
}

pub async fn uninstall(ctx: &ContextArgs, args: UninstallArgs) -> CliResult {
    if !args.yes {
        return Err(format!(
            "this stops {} and deletes {}; re-run with --yes to confirm",
            ctx.unit,
            ctx.config.display()
        )
        .into());
    }
    let rc = ctx.context();
    let svc = rc.service();
    if let Err(e) = svc.stop().await {
        warn!(error = %e, "stop failed, continuing");
    }
    if let Err(e) = svc.disable().await {
        warn!(error = %e, "disable failed, continuing");
    }
    if rc.store().remove()? {
        println!("Removed {}", ctx.config.display());
    } else {
        println!("No configuration at {}", ctx.config.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_aliases() {
        assert_eq!(resolve_listener_tag("relay"), "ss-in");
        assert_eq!(resolve_listener_tag("ss"), "ss-in");
        assert_eq!(resolve_listener_tag("http"), "http-in");
        assert_eq!(resolve_listener_tag("socks"), "socks-in");
        assert_eq!(resolve_listener_tag("diag"), "diag-in");
        assert_eq!(resolve_listener_tag("custom-in"), "custom-in");
    }

    #[test]
    fn port_args_map_to_listener_ports() {
        let p = PortArgs {
            relay: 8443,
            http_port: 8080,
            socks_port: 1081,
        };
        let lp: ListenerPorts = (&p).into();
        assert_eq!(lp.relay, 8443);
        assert_eq!(lp.http, 8080);
        assert_eq!(lp.socks, 1081);
    }

    #[tokio::test]
    async fn uninstall_requires_confirmation() {
        let ctx = ContextArgs::default();
        let err = uninstall(&ctx, UninstallArgs { yes: false })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--yes"));
    }

    #[tokio::test]
    async fn logs_refuse_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ContextArgs {
            config: dir.path().join("config.json"),
            ..ContextArgs::default()
        };
        let mut doc = build_gateway(ListenerPorts::default()).unwrap();
        set_log_level(&mut doc, "none").unwrap();
        std::fs::write(&ctx.config, serialize_document(&doc).unwrap()).unwrap();

        let err = logs(&ctx, LogsArgs { error: false, lines: 5 })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"), "{err}");
    }
}
