//! Relay accounts.
//!
//! Every account is shared by the relay-cipher, http and socks listeners.
//!
//! # Example
//!
//! ```
//! use relayctl_accounts::registry;
//! use relayctl_config::{ListenerPorts, build_gateway};
//!
//! let mut doc = build_gateway(ListenerPorts::default()).unwrap();
//! let alice = registry::add(&mut doc, "alice", None).unwrap();
//! assert_eq!(registry::list(&doc).unwrap().len(), 2);
//! registry::remove(&mut doc, &alice.identifier).unwrap();
//! ```

pub mod cli;
mod error;
pub mod link;
pub mod registry;

pub use cli::AccountArgs;
pub use error::AccountError;
pub use link::{share_link, share_link_for};
