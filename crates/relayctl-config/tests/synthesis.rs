//! Synthesizer and on-disk mapping properties.

use std::collections::BTreeSet;

use proptest::prelude::*;
use relayctl_config::{
    ConfigDocument, ListenerPorts, Role, Rule, UpstreamSpec, XrayConfig, build_edge, build_gateway,
    parse_document, serialize_document, validate_document,
};

/// Identifier sets as they appear in each listener's on-disk account list.
fn wire_identifier_sets(doc: &ConfigDocument) -> Vec<BTreeSet<String>> {
    let wire: XrayConfig = doc.to_wire();
    wire.inbounds
        .iter()
        .filter_map(|inb| {
            let settings = &inb.settings;
            let list = settings
                .get("clients")
                .or_else(|| settings.get("accounts"))?
                .as_array()?;
            Some(
                list.iter()
                    .filter_map(|e| e.get("email").or_else(|| e.get("user")))
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            )
        })
        .collect()
}

fn assert_rule_layout(doc: &ConfigDocument) {
    let rules = doc.routing.rules();
    assert!(matches!(rules[0], Rule::BuiltinControl(_)));
    match doc.role() {
        Role::Gateway => {
            assert!(matches!(rules[1], Rule::BuiltinPrivateBlock(_)));
            assert!(rules[2..].iter().all(Rule::is_custom));
        }
        Role::Edge => {
            assert!(matches!(rules.last(), Some(Rule::BuiltinCatchAll(_))));
            assert!(rules[1..rules.len() - 1].iter().all(Rule::is_custom));
        }
    }
}

fn distinct_ports() -> impl Strategy<Value = ListenerPorts> {
    (1u16..10000, 10900u16..20000, 20000u16..=65535).prop_map(|(relay, http, socks)| {
        ListenerPorts { relay, http, socks }
    })
}

proptest! {
    #[test]
    fn gateway_synthesis_invariants(ports in distinct_ports()) {
        let doc = build_gateway(ports).unwrap();
        prop_assert_eq!(doc.accounts.len(), 1);
        let sets = wire_identifier_sets(&doc);
        prop_assert_eq!(sets.len(), 3);
        prop_assert!(sets.windows(2).all(|w| w[0] == w[1]));
        prop_assert_eq!(doc.routing.custom().len(), 0);
        assert_rule_layout(&doc);
        prop_assert!(validate_document(&doc).is_ok());
    }

    #[test]
    fn edge_synthesis_invariants(
        ports in distinct_ports(),
        upstream_port in 1u16..=65535,
        secret in "[A-Za-z0-9]{8,32}",
    ) {
        let doc = build_edge(ports, UpstreamSpec {
            address: "relay.example.com".into(),
            port: upstream_port,
            secret,
        }).unwrap();
        prop_assert_eq!(doc.accounts.len(), 1);
        let sets = wire_identifier_sets(&doc);
        prop_assert_eq!(sets.len(), 3);
        prop_assert!(sets.windows(2).all(|w| w[0] == w[1]));
        assert_rule_layout(&doc);
        prop_assert!(validate_document(&doc).is_ok());
    }
}

#[test]
fn serialized_document_reloads_identically() {
    let doc = build_edge(
        ListenerPorts::default(),
        UpstreamSpec {
            address: "10.0.0.1".into(),
            port: 443,
            secret: "secretX".into(),
        },
    )
    .unwrap();
    let bytes = serialize_document(&doc).unwrap();
    let reloaded = parse_document(&bytes).unwrap();
    assert_eq!(reloaded, doc);
    assert_eq!(reloaded.role(), Role::Edge);
}

#[test]
fn on_disk_layout_matches_engine_schema() {
    let doc = build_gateway(ListenerPorts::default()).unwrap();
    let v: serde_json::Value = serde_json::from_slice(&serialize_document(&doc).unwrap()).unwrap();
    assert_eq!(v["relayctl"]["role"], "gateway");
    assert_eq!(v["api"]["tag"], "api");
    assert_eq!(v["inbounds"][0]["listen"], "127.0.0.1");
    assert_eq!(v["inbounds"][1]["protocol"], "shadowsocks");
    assert_eq!(v["inbounds"][3]["settings"]["auth"], "password");
    assert_eq!(v["outbounds"][0]["protocol"], "freedom");
    assert_eq!(v["routing"]["rules"][0]["ruleTag"], "control");
    assert_eq!(v["routing"]["rules"][1]["ip"][0], "geoip:private");
}
