//! Error types for custom routing rules.

use relayctl_config::{ConfigError, Role};
use relayctl_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("outbound '{tag}' is not available on a {role} node (expected one of: {allowed})")]
    InvalidOutbound {
        tag: String,
        role: Role,
        allowed: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("there are no custom rules")]
    NoCustomRules,

    #[error("rule {index} does not exist (valid: 1-{count})")]
    InvalidIndex { index: i64, count: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
