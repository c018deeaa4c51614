//! Custom routing rules for relay nodes.
//!
//! The engine evaluates rules top to bottom and the first match wins, so
//! where a custom rule lands matters:
//!
//! - GATEWAY: after the control and private-block rules, in insertion order.
//!   Unmatched traffic falls through to `direct`.
//! - EDGE: after the control rule and before the catch-all that forwards
//!   everything else to the upstream relay.
//!
//! # Example
//!
//! ```
//! use relayctl_config::{ListenerPorts, MatchKind, build_gateway};
//! use relayctl_rules::{Target, engine};
//!
//! let mut doc = build_gateway(ListenerPorts::default()).unwrap();
//! engine::add(&mut doc, Target::Blackhole, MatchKind::Domain, &["ads.example".into()]).unwrap();
//! assert_eq!(engine::list(&doc).len(), 1);
//! ```

pub mod cli;
pub mod engine;
pub mod error;
pub mod rule;

pub use cli::RuleArgs;
pub use error::RulesError;
pub use rule::Target;
