//! Error class constants for structured logging.
//!
//! Emitted as the `kind` field on `warn!`/`error!` events so log lines can be
//! grouped regardless of which crate produced them.

/// Bad user input (port, address, identifier, level token).
pub const ERROR_INPUT: &str = "input";
/// Operation precondition failed against the current document.
pub const ERROR_PRECONDITION: &str = "precondition";
/// The engine's self-test rejected a candidate document.
pub const ERROR_REJECTED: &str = "rejected";
/// The service manager failed to (re)start the engine.
pub const ERROR_SERVICE: &str = "service";
/// Network or engine query failed after all retries.
pub const ERROR_TRANSIENT: &str = "transient";
/// I/O error.
pub const ERROR_IO: &str = "io";
/// Configuration document could not be parsed or is inconsistent.
pub const ERROR_CONFIG: &str = "config";
