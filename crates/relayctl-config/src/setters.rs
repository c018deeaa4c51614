//! Port, log-level and upstream setters.
//!
//! Each setter edits the document in place and performs all input checks
//! before touching it, so a returned error means nothing changed.

use relayctl_core::{is_valid_address, is_valid_port};
use tracing::debug;

use crate::document::{ConfigDocument, LogLevel, LogSettings, Role};
use crate::loader::ConfigError;

/// Outcome of a setter that may turn out to be a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortChange {
    Unchanged,
    Changed { from: u16, to: u16 },
}

pub fn set_listener_port(
    doc: &mut ConfigDocument,
    tag: &str,
    new_port: i64,
) -> Result<PortChange, ConfigError> {
    if !is_valid_port(new_port) {
        return Err(ConfigError::InvalidPort(new_port));
    }
    let port = u16::try_from(new_port).map_err(|_| ConfigError::InvalidPort(new_port))?;

    let current = doc
        .listener(tag)
        .ok_or_else(|| ConfigError::ListenerNotFound(tag.to_string()))?
        .port;
    if current == port {
        return Ok(PortChange::Unchanged);
    }
    if let Some(other) = doc.listeners.iter().find(|l| l.port == port && l.tag != tag) {
        return Err(ConfigError::PortInUse {
            port,
            tag: other.tag.clone(),
        });
    }

    if let Some(l) = doc.listener_mut(tag) {
        l.port = port;
    }
    debug!(tag, from = current, to = port, "listener port changed");
    Ok(PortChange::Changed {
        from: current,
        to: port,
    })
}

/// Set the engine log level. `none` disables both log files; any other
/// level points them at the standard locations.
pub fn set_log_level(doc: &mut ConfigDocument, level: &str) -> Result<LogLevel, ConfigError> {
    let level: LogLevel = level.parse()?;
    doc.log = LogSettings::standard(level);
    debug!(%level, "log level set");
    Ok(level)
}

/// Rewrite the upstream relay coordinates of an EDGE node. The secret is
/// kept when `secret` is `None`.
pub fn set_upstream(
    doc: &mut ConfigDocument,
    address: &str,
    port: i64,
    secret: Option<&str>,
) -> Result<(), ConfigError> {
    if doc.role() != Role::Edge {
        return Err(ConfigError::RoleMismatch {
            expected: Role::Edge,
            actual: doc.role(),
        });
    }
    let address = address.trim();
    if !is_valid_address(address) {
        return Err(ConfigError::InvalidInput(format!(
            "'{address}' is not an IPv4 address or host name"
        )));
    }
    if !is_valid_port(port) {
        return Err(ConfigError::InvalidPort(port));
    }
    let port = u16::try_from(port).map_err(|_| ConfigError::InvalidPort(port))?;
    if secret.is_some_and(str::is_empty) {
        return Err(ConfigError::InvalidInput(
            "upstream secret must not be empty".into(),
        ));
    }

    let relay = doc
        .upstream_mut()
        .ok_or_else(|| ConfigError::NotConfigured("edge node has no upstream outbound".into()))?;
    relay.address = address.to_string();
    relay.port = port;
    if let Some(secret) = secret {
        relay.secret = secret.to_string();
    }
    debug!(address, port, "upstream relay updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{ListenerPorts, UpstreamSpec, build_edge, build_gateway};
    use relayctl_core::{DEFAULT_ACCESS_LOG, DEFAULT_ERROR_LOG, TAG_HTTP_IN, TAG_RELAY_IN};
    use std::path::PathBuf;

    fn gateway() -> ConfigDocument {
        build_gateway(ListenerPorts::default()).unwrap()
    }

    #[test]
    fn port_change_and_noop() {
        let mut doc = gateway();
        assert_eq!(
            set_listener_port(&mut doc, TAG_RELAY_IN, 8443).unwrap(),
            PortChange::Changed { from: 443, to: 8443 }
        );
        assert_eq!(doc.listener(TAG_RELAY_IN).unwrap().port, 8443);
        assert_eq!(
            set_listener_port(&mut doc, TAG_RELAY_IN, 8443).unwrap(),
            PortChange::Unchanged
        );
    }

    #[test]
    fn port_out_of_range() {
        let mut doc = gateway();
        let before = doc.clone();
        for bad in [0, -1, 65536] {
            assert!(matches!(
                set_listener_port(&mut doc, TAG_RELAY_IN, bad),
                Err(ConfigError::InvalidPort(p)) if p == bad
            ));
        }
        assert_eq!(doc, before);
    }

    #[test]
    fn port_collision() {
        let mut doc = gateway();
        let err = set_listener_port(&mut doc, TAG_HTTP_IN, 443).unwrap_err();
        assert!(
            matches!(err, ConfigError::PortInUse { port: 443, ref tag } if tag == TAG_RELAY_IN)
        );
    }

    #[test]
    fn unknown_listener() {
        let mut doc = gateway();
        assert!(matches!(
            set_listener_port(&mut doc, "nope-in", 9000),
            Err(ConfigError::ListenerNotFound(_))
        ));
    }

    #[test]
    fn log_level_none_then_debug_restores_paths() {
        let mut doc = gateway();
        set_log_level(&mut doc, "none").unwrap();
        assert_eq!(doc.log.access, None);
        assert_eq!(doc.log.error, None);

        set_log_level(&mut doc, "debug").unwrap();
        assert_eq!(doc.log.level, LogLevel::Debug);
        assert_eq!(doc.log.access, Some(PathBuf::from(DEFAULT_ACCESS_LOG)));
        assert_eq!(doc.log.error, Some(PathBuf::from(DEFAULT_ERROR_LOG)));
    }

    #[test]
    fn log_level_bad_token() {
        let mut doc = gateway();
        let before = doc.clone();
        assert!(matches!(
            set_log_level(&mut doc, "loud"),
            Err(ConfigError::InvalidInput(_))
        ));
        assert_eq!(doc, before);
    }

    #[test]
    fn upstream_on_gateway_is_role_mismatch() {
        let mut doc = gateway();
        assert!(matches!(
            set_upstream(&mut doc, "1.2.3.4", 443, None),
            Err(ConfigError::RoleMismatch { .. })
        ));
    }

    #[test]
    fn upstream_rewrite_keeps_secret() {
        let mut doc = build_edge(
            ListenerPorts::default(),
            UpstreamSpec {
                address: "1.2.3.4".into(),
                port: 443,
                secret: "secretX".into(),
            },
        )
        .unwrap();
        set_upstream(&mut doc, "gw2.example.org", 8443, None).unwrap();
        let up = doc.upstream().unwrap();
        assert_eq!(up.address, "gw2.example.org");
        assert_eq!(up.port, 8443);
        assert_eq!(up.secret, "secretX");

        assert!(set_upstream(&mut doc, "999.1.1.1", 443, None).is_err());
        assert_eq!(doc.upstream().unwrap().address, "gw2.example.org");
    }
}
