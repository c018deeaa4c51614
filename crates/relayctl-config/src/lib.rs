//! Relay configuration document: typed model, engine JSON mapping,
//! synthesis, setters, validation and the atomic on-disk store.
//!
//! ```text
//! types (engine JSON)  <->  document (checked model)
//!                               |
//!        synth / setters / accounts / rules mutate a private copy
//!                               |
//!        store: lock -> validate -> external validator -> rename
//! ```

mod defaults;
pub mod document;
pub mod loader;
pub mod routing;
pub mod setters;
pub mod store;
pub mod synth;
pub mod types;
pub mod validate;
pub mod validator;

pub use document::{
    Account, ConfigDocument, Listener, ListenerProtocol, LogLevel, LogSettings, Outbound,
    OutboundKind, Role, Unmanaged, UpstreamRelay,
};
pub use loader::{ConfigError, load_document, parse_document, serialize_document};
pub use routing::{
    CatchAllRule, ControlRule, CustomRule, MatchKind, PRIVATE_IP_SELECTOR, PrivateBlockRule,
    RoutingTable, Rule,
};
pub use setters::{PortChange, set_listener_port, set_log_level, set_upstream};
pub use store::{Commit, ConfigStore, LockMode};
pub use synth::{ListenerPorts, UpstreamSpec, build_edge, build_gateway, client_inbound_tags};
pub use types::XrayConfig;
pub use validate::validate_document;
pub use validator::{ConfigValidator, Rejection};
