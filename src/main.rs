//! relayctl: manage a two-tier Xray relay node.
//!
//! - `relayctl setup gateway|edge` - write a fresh node configuration
//! - `relayctl account ...` - add, remove, list and share accounts
//! - `relayctl rule ...` - custom routing rules
//! - `relayctl set ...` - ports, log level, upstream relay
//! - `relayctl show | stats | logs | service | uninstall`

use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use relayctl_engine::ContextArgs;
use relayctl_engine::cli::{
    LogsArgs, ServiceArgs, SetArgs, SetupArgs, ShowArgs, StatsArgs, UninstallArgs,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "relayctl",
    version,
    about = "Manage a two-tier (edge/gateway) Xray relay",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    ctx: ContextArgs,

    /// Diagnostic log filter (error, warn, info, debug, trace).
    #[arg(long, env = "RELAYCTL_LOG", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a fresh GATEWAY or EDGE configuration and start the engine.
    Setup(SetupArgs),

    /// Manage accounts.
    #[command(alias = "user")]
    Account(relayctl_accounts::AccountArgs),

    /// Manage custom routing rules.
    Rule(relayctl_rules::RuleArgs),

    /// Change a single setting.
    Set(SetArgs),

    /// Print a summary of the current configuration.
    Show(ShowArgs),

    /// Control the engine service.
    Service(ServiceArgs),

    /// Traffic statistics.
    Stats(StatsArgs),

    /// Tail the engine logs.
    Logs(LogsArgs),

    /// Stop the engine and remove its configuration.
    Uninstall(UninstallArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let ctx = &cli.ctx;
    debug!(
        version = relayctl_core::VERSION,
        config = %ctx.config.display(),
        engine = %ctx.engine_bin.display(),
        unit = %ctx.unit,
        "relayctl starting"
    );
    let result = match cli.command {
        Commands::Setup(args) => relayctl_engine::cli::setup(ctx, args).await,
        Commands::Account(args) => relayctl_accounts::cli::run(ctx, args).await,
        Commands::Rule(args) => relayctl_rules::cli::run(ctx, args).await,
        Commands::Set(args) => relayctl_engine::cli::set(ctx, args).await,
        Commands::Show(args) => relayctl_engine::cli::show(ctx, args).await,
        Commands::Service(args) => relayctl_engine::cli::service(ctx, args).await,
        Commands::Stats(args) => relayctl_engine::cli::stats(ctx, args).await,
        Commands::Logs(args) => relayctl_engine::cli::logs(ctx, args).await,
        Commands::Uninstall(args) => relayctl_engine::cli::uninstall(ctx, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "relayctl",
            "account",
            "list",
            "--config",
            "/tmp/x.json",
            "--no-restart",
        ])
        .unwrap();
        assert_eq!(cli.ctx.config.to_str(), Some("/tmp/x.json"));
        assert!(cli.ctx.no_restart);
        assert!(matches!(cli.command, Commands::Account(_)));
    }
}
