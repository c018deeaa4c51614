//! Engine-side error types.

use std::path::PathBuf;

use relayctl_config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// The unit did not come up after a committed change. The new
    /// document stays in place.
    #[error("service {unit}: {action} failed: {detail} (configuration at {config} was committed)")]
    ServiceFailure {
        unit: String,
        action: &'static str,
        detail: String,
        config: PathBuf,
    },

    #[error("service manager: {0}")]
    Service(String),

    #[error("{what} failed after {attempts} attempts: {last}")]
    Transient {
        what: &'static str,
        attempts: u32,
        last: String,
    },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("engine binary not found at {0}")]
    EngineMissing(PathBuf),

    #[error("unexpected statistics output: {0}")]
    StatsFormat(String),

    #[error("engine logging is disabled; enable it with `relayctl set log-level warning`")]
    LoggingDisabled,
}
