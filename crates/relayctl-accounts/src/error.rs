//! Account registry error types.

use relayctl_config::ConfigError;
use relayctl_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Identifier or secret failed input checks.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("account '{0}' already exists")]
    DuplicateAccount(String),

    #[error("account '{0}' not found")]
    AccountNotFound(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
