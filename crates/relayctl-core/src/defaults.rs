//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Paths
// ============================================================================

/// Default location of the engine configuration document.
pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/xray/config.json";
/// Default engine binary.
pub const DEFAULT_ENGINE_BIN: &str = "/usr/local/bin/xray";
/// Default service-manager unit name.
pub const DEFAULT_UNIT_NAME: &str = "xray";
/// Standard access log location.
pub const DEFAULT_ACCESS_LOG: &str = "/var/log/xray/access.log";
/// Standard error log location.
pub const DEFAULT_ERROR_LOG: &str = "/var/log/xray/error.log";
/// Sentinel the engine understands as "logging disabled".
pub const LOG_DISABLED: &str = "none";

// ============================================================================
// Listener Defaults
// ============================================================================

/// Default relay-cipher (shadowsocks) listener port.
pub const DEFAULT_RELAY_PORT: u16 = 443;
/// Default HTTP proxy listener port.
pub const DEFAULT_HTTP_PORT: u16 = 80;
/// Default SOCKS listener port.
pub const DEFAULT_SOCKS_PORT: u16 = 1080;
/// Loopback port of the control (stats API) listener.
pub const DEFAULT_CONTROL_PORT: u16 = 10085;
/// Loopback port of the EDGE diagnostic listener.
pub const DEFAULT_DIAGNOSTIC_PORT: u16 = 10808;
/// Bind address for public listeners.
pub const DEFAULT_PUBLIC_BIND: &str = "0.0.0.0";
/// Bind address for loopback-only listeners.
pub const LOOPBACK_BIND: &str = "127.0.0.1";

// ============================================================================
// Tags
// ============================================================================

/// Control listener / virtual outbound tag.
pub const TAG_CONTROL: &str = "api";
/// Relay-cipher listener tag.
pub const TAG_RELAY_IN: &str = "ss-in";
/// HTTP listener tag.
pub const TAG_HTTP_IN: &str = "http-in";
/// SOCKS listener tag.
pub const TAG_SOCKS_IN: &str = "socks-in";
/// EDGE diagnostic listener tag.
pub const TAG_DIAGNOSTIC_IN: &str = "diag-in";
/// Direct egress outbound tag.
pub const TAG_DIRECT: &str = "direct";
/// Drop-everything outbound tag.
pub const TAG_BLACKHOLE: &str = "blackhole";
/// Upstream relay outbound tag (EDGE only).
pub const TAG_UPSTREAM: &str = "relay";

// ============================================================================
// Account Defaults
// ============================================================================

/// Default relay-cipher method for new accounts and upstream links.
pub const DEFAULT_CIPHER_METHOD: &str = "aes-256-gcm";
/// Length of generated account secrets.
pub const DEFAULT_SECRET_LEN: usize = 24;
/// Minimum accepted length of generated secrets.
pub const MIN_SECRET_LEN: usize = 16;
/// Identifier given to the account created at setup time.
pub const SEED_ACCOUNT_ID: &str = "admin";

// ============================================================================
// Engine Query Defaults
// ============================================================================

/// Timeout for a single statistics query, in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 5;
/// Attempts made before a query is reported as failed.
pub const DEFAULT_QUERY_ATTEMPTS: u32 = 3;
/// Fixed delay between query attempts, in milliseconds.
pub const DEFAULT_QUERY_RETRY_DELAY_MS: u64 = 1000;

// ============================================================================
// Document Metadata
// ============================================================================

/// Informational schema version written into generated documents.
pub const SCHEMA_VERSION: &str = "1";
