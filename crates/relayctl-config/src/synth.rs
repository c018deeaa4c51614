//! Fresh document synthesis for both node roles.

use relayctl_core::{
    DEFAULT_CIPHER_METHOD, DEFAULT_CONTROL_PORT, DEFAULT_DIAGNOSTIC_PORT, DEFAULT_HTTP_PORT,
    DEFAULT_PUBLIC_BIND, DEFAULT_RELAY_PORT, DEFAULT_SECRET_LEN, DEFAULT_SOCKS_PORT,
    LOOPBACK_BIND, SEED_ACCOUNT_ID, TAG_CONTROL, TAG_DIAGNOSTIC_IN, TAG_HTTP_IN, TAG_RELAY_IN,
    TAG_SOCKS_IN, generate_secret, is_valid_address,
};
use tracing::info;

use crate::document::{
    Account, ConfigDocument, Listener, ListenerProtocol, Outbound, Role, Unmanaged, UpstreamRelay,
};
use crate::loader::ConfigError;
use crate::routing::{CatchAllRule, RoutingTable};

/// Public ports of the three client-facing listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerPorts {
    pub relay: u16,
    pub http: u16,
    pub socks: u16,
}

impl Default for ListenerPorts {
    fn default() -> Self {
        Self {
            relay: DEFAULT_RELAY_PORT,
            http: DEFAULT_HTTP_PORT,
            socks: DEFAULT_SOCKS_PORT,
        }
    }
}

impl ListenerPorts {
    fn check(&self) -> Result<(), ConfigError> {
        let named = [
            (TAG_RELAY_IN, self.relay),
            (TAG_HTTP_IN, self.http),
            (TAG_SOCKS_IN, self.socks),
        ];
        for (i, &(tag, port)) in named.iter().enumerate() {
            if port == 0 {
                return Err(ConfigError::InvalidPort(0));
            }
            if port == DEFAULT_CONTROL_PORT || port == DEFAULT_DIAGNOSTIC_PORT {
                return Err(ConfigError::InvalidInput(format!(
                    "port {port} for {tag} is reserved for the local control listeners"
                )));
            }
            if let Some(&(other, _)) = named[..i].iter().find(|(_, p)| *p == port) {
                return Err(ConfigError::PortInUse {
                    port,
                    tag: other.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Coordinates of the relay an EDGE node forwards to.
#[derive(Debug, Clone)]
pub struct UpstreamSpec {
    pub address: String,
    pub port: u16,
    pub secret: String,
}

fn listener(tag: &str, protocol: ListenerProtocol, port: u16, listen: &str) -> Listener {
    Listener {
        tag: tag.to_string(),
        protocol,
        port,
        listen: listen.to_string(),
        authenticated: protocol != ListenerProtocol::Control,
        unmanaged: Unmanaged::default(),
    }
}

fn common_listeners(ports: ListenerPorts) -> Vec<Listener> {
    vec![
        listener(
            TAG_CONTROL,
            ListenerProtocol::Control,
            DEFAULT_CONTROL_PORT,
            LOOPBACK_BIND,
        ),
        listener(
            TAG_RELAY_IN,
            ListenerProtocol::RelayCipher,
            ports.relay,
            DEFAULT_PUBLIC_BIND,
        ),
        listener(
            TAG_HTTP_IN,
            ListenerProtocol::Http,
            ports.http,
            DEFAULT_PUBLIC_BIND,
        ),
        listener(
            TAG_SOCKS_IN,
            ListenerProtocol::Socks,
            ports.socks,
            DEFAULT_PUBLIC_BIND,
        ),
    ]
}

fn seed_account() -> Account {
    Account {
        identifier: SEED_ACCOUNT_ID.to_string(),
        secret: generate_secret(DEFAULT_SECRET_LEN),
        method: DEFAULT_CIPHER_METHOD.to_string(),
    }
}

/// Build a GATEWAY document: four listeners, `direct` + `blackhole`,
/// control and private-block rules, one seed account.
pub fn build_gateway(ports: ListenerPorts) -> Result<ConfigDocument, ConfigError> {
    ports.check()?;
    let doc = ConfigDocument::new(
        Role::Gateway,
        common_listeners(ports),
        vec![seed_account()],
        vec![Outbound::direct(), Outbound::blackhole()],
        RoutingTable::gateway(),
    );
    info!(role = %doc.role(), relay_port = ports.relay, "synthesized configuration");
    Ok(doc)
}

/// Build an EDGE document: the GATEWAY listeners plus a loopback
/// no-auth diagnostic listener, `relay` + `direct` + `blackhole`,
/// control and catch-all rules, one seed account.
pub fn build_edge(
    ports: ListenerPorts,
    upstream: UpstreamSpec,
) -> Result<ConfigDocument, ConfigError> {
    ports.check()?;
    if !is_valid_address(&upstream.address) {
        return Err(ConfigError::InvalidInput(format!(
            "upstream address '{}' is not an IPv4 address or host name",
            upstream.address
        )));
    }
    if upstream.port == 0 {
        return Err(ConfigError::InvalidPort(0));
    }
    if upstream.secret.is_empty() {
        return Err(ConfigError::InvalidInput(
            "upstream secret must not be empty".into(),
        ));
    }

    let mut listeners = common_listeners(ports);
    listeners.push(Listener {
        authenticated: false,
        ..listener(
            TAG_DIAGNOSTIC_IN,
            ListenerProtocol::Socks,
            DEFAULT_DIAGNOSTIC_PORT,
            LOOPBACK_BIND,
        )
    });

    let catch_all = CatchAllRule::to_upstream(client_inbound_tags(&listeners));
    let relay = UpstreamRelay {
        address: upstream.address,
        port: upstream.port,
        secret: upstream.secret,
        method: DEFAULT_CIPHER_METHOD.to_string(),
        options: Default::default(),
    };

    let doc = ConfigDocument::new(
        Role::Edge,
        listeners,
        vec![seed_account()],
        vec![Outbound::upstream(relay), Outbound::direct(), Outbound::blackhole()],
        RoutingTable::edge(catch_all),
    );
    info!(
        role = %doc.role(),
        relay_port = ports.relay,
        upstream = %doc.upstream().map(|u| u.address.as_str()).unwrap_or_default(),
        "synthesized configuration"
    );
    Ok(doc)
}

/// Tags of every listener whose traffic the EDGE catch-all forwards.
pub fn client_inbound_tags(listeners: &[Listener]) -> Vec<String> {
    listeners
        .iter()
        .filter(|l| l.is_client_facing())
        .map(|l| l.tag.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Rule;

    fn upstream() -> UpstreamSpec {
        UpstreamSpec {
            address: "1.2.3.4".into(),
            port: 443,
            secret: "secretX".into(),
        }
    }

    #[test]
    fn gateway_scenario() {
        let doc = build_gateway(ListenerPorts {
            relay: 443,
            http: 80,
            socks: 1080,
        })
        .unwrap();
        assert_eq!(doc.role(), Role::Gateway);
        assert_eq!(doc.listeners.len(), 4);
        let tags: Vec<_> = doc.outbounds.iter().map(|o| o.tag.as_str()).collect();
        assert_eq!(tags, ["direct", "blackhole"]);
        assert_eq!(doc.routing.len(), 2);
        assert_eq!(doc.accounts.len(), 1);
        assert!(doc.accounts[0].secret.len() >= 16);
    }

    #[test]
    fn edge_layout() {
        let doc = build_edge(ListenerPorts::default(), upstream()).unwrap();
        assert_eq!(doc.role(), Role::Edge);
        assert_eq!(doc.listeners.len(), 5);

        let diag = doc.listener(TAG_DIAGNOSTIC_IN).unwrap();
        assert!(diag.is_loopback());
        assert!(!diag.authenticated);

        let up = doc.upstream().unwrap();
        assert_eq!(up.address, "1.2.3.4");
        assert_eq!(up.secret, "secretX");

        let rules = doc.routing.rules();
        assert_eq!(rules.len(), 2);
        assert!(matches!(rules[0], Rule::BuiltinControl(_)));
        match &rules[1] {
            Rule::BuiltinCatchAll(c) => {
                assert_eq!(c.outbound_tag, "relay");
                assert!(c.inbound_tags.contains(&"diag-in".to_string()));
                assert!(!c.inbound_tags.contains(&"api".to_string()));
            }
            other => panic!("expected catch-all, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_ports_are_rejected() {
        let err = build_gateway(ListenerPorts {
            relay: 443,
            http: 443,
            socks: 1080,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::PortInUse { port: 443, .. }));
    }

    #[test]
    fn zero_port_is_rejected() {
        let ports = ListenerPorts {
            socks: 0,
            ..ListenerPorts::default()
        };
        assert!(matches!(
            build_gateway(ports),
            Err(ConfigError::InvalidPort(0))
        ));
    }

    #[test]
    fn bad_upstream_address_is_rejected() {
        let spec = UpstreamSpec {
            address: "not a host".into(),
            ..upstream()
        };
        assert!(matches!(
            build_edge(ListenerPorts::default(), spec),
            Err(ConfigError::InvalidInput(_))
        ));
    }

    #[test]
    fn seed_secrets_differ_between_builds() {
        let a = build_gateway(ListenerPorts::default()).unwrap();
        let b = build_gateway(ListenerPorts::default()).unwrap();
        assert_ne!(a.accounts[0].secret, b.accounts[0].secret);
    }
}
