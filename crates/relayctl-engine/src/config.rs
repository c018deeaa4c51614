//! Tool-level settings shared by every subcommand.
//!
//! All flags can also be supplied through the environment, which is the
//! usual way to point a whole session at a non-default install.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use relayctl_config::{ConfigStore, LockMode};
use relayctl_core::defaults;

use crate::context::RelayContext;
use crate::service::Systemd;
use crate::validator::EngineValidator;

#[derive(Args, Debug, Clone)]
pub struct ContextArgs {
    /// Engine configuration document.
    #[arg(
        long = "config",
        env = "RELAYCTL_CONFIG",
        default_value = defaults::DEFAULT_CONFIG_PATH,
        global = true
    )]
    pub config: PathBuf,

    /// Engine binary, used for self-tests and statistics queries.
    #[arg(
        long = "xray-bin",
        env = "RELAYCTL_XRAY_BIN",
        default_value = defaults::DEFAULT_ENGINE_BIN,
        global = true
    )]
    pub engine_bin: PathBuf,

    /// Service-manager unit running the engine.
    #[arg(
        long,
        env = "RELAYCTL_UNIT",
        default_value = defaults::DEFAULT_UNIT_NAME,
        global = true
    )]
    pub unit: String,

    /// Fail instead of waiting when another relayctl holds the lock.
    #[arg(long, global = true)]
    pub no_wait: bool,

    /// Commit changes without restarting the engine.
    #[arg(long, global = true)]
    pub no_restart: bool,
}

impl Default for ContextArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from(defaults::DEFAULT_CONFIG_PATH),
            engine_bin: PathBuf::from(defaults::DEFAULT_ENGINE_BIN),
            unit: defaults::DEFAULT_UNIT_NAME.to_string(),
            no_wait: false,
            no_restart: false,
        }
    }
}

impl ContextArgs {
    pub fn lock_mode(&self) -> LockMode {
        if self.no_wait {
            LockMode::NoWait
        } else {
            LockMode::Wait
        }
    }

    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(&self.config).with_lock_mode(self.lock_mode())
    }

    /// Production context: engine self-test plus systemd.
    pub fn context(&self) -> RelayContext {
        RelayContext::new(
            self.store(),
            Arc::new(EngineValidator::new(&self.engine_bin)),
            Arc::new(Systemd::new(&self.unit)),
        )
        .with_restart(!self.no_restart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        ctx: ContextArgs,
    }

    #[test]
    fn defaults_apply() {
        let h = Harness::try_parse_from(["relayctl"]).unwrap();
        assert_eq!(h.ctx.config, PathBuf::from(defaults::DEFAULT_CONFIG_PATH));
        assert_eq!(h.ctx.unit, "xray");
        assert_eq!(h.ctx.lock_mode(), LockMode::Wait);
        assert!(!h.ctx.no_restart);
    }

    #[test]
    fn flags_override() {
        let h = Harness::try_parse_from([
            "relayctl",
            "--config",
            "/tmp/x.json",
            "--unit",
            "xray-edge",
            "--no-wait",
            "--no-restart",
        ])
        .unwrap();
        assert_eq!(h.ctx.config, PathBuf::from("/tmp/x.json"));
        assert_eq!(h.ctx.unit, "xray-edge");
        assert_eq!(h.ctx.lock_mode(), LockMode::NoWait);
        assert!(h.ctx.no_restart);
        assert_eq!(h.ctx.store().path(), std::path::Path::new("/tmp/x.json"));
    }
}
