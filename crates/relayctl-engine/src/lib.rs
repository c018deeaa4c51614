//! Engine-facing side of relayctl: the self-test validator, the service
//! manager, statistics and log access, and [`RelayContext`], which ties the
//! configuration store to an engine restart after every committed change.
//!
//! # Usage
//!
//! ```bash
//! relayctl setup gateway
//! relayctl service status
//! relayctl stats
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod logs;
pub mod retry;
pub mod service;
pub mod stats;
pub mod validator;

pub use config::ContextArgs;
pub use context::RelayContext;
pub use error::EngineError;
pub use service::{ServiceManager, Systemd};
pub use validator::EngineValidator;
