//! Core types and constants shared across relayctl crates.
//!
//! This crate provides:
//! - Default ports, paths and cipher settings
//! - Error classification constants for logging
//! - Host/port syntax validation
//! - Account secret generation

pub mod address;
pub mod defaults;
pub mod errors;
pub mod secret;

// Re-export commonly used items at crate root
pub use address::{is_valid_address, is_valid_port, parse_port};
pub use defaults::*;
pub use errors::*;
pub use secret::generate_secret;

/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
