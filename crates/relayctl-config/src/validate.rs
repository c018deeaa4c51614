//! Structural validation of a checked document.
//!
//! Runs before every commit, ahead of the engine's own self-test.

use std::collections::HashSet;

use relayctl_core::{
    TAG_CONTROL, TAG_DIAGNOSTIC_IN, TAG_HTTP_IN, TAG_RELAY_IN, TAG_SOCKS_IN, TAG_UPSTREAM,
    is_valid_address,
};

use crate::document::{ConfigDocument, ListenerProtocol, LogLevel, Role};
use crate::loader::ConfigError;

/// Listeners every document must carry, with their expected protocol.
const REQUIRED_LISTENERS: [(&str, ListenerProtocol); 4] = [
    (TAG_CONTROL, ListenerProtocol::Control),
    (TAG_RELAY_IN, ListenerProtocol::RelayCipher),
    (TAG_HTTP_IN, ListenerProtocol::Http),
    (TAG_SOCKS_IN, ListenerProtocol::Socks),
];

pub fn validate_document(doc: &ConfigDocument) -> Result<(), ConfigError> {
    validate_listeners(doc)?;
    validate_accounts(doc)?;
    validate_outbounds(doc)?;
    validate_routing(doc)?;
    validate_log(doc)
}

fn validate_listeners(doc: &ConfigDocument) -> Result<(), ConfigError> {
    let mut tags = HashSet::new();
    let mut ports = HashSet::new();
    for l in &doc.listeners {
        if l.tag.trim().is_empty() {
            return Err(ConfigError::Validation("inbounds: empty tag".into()));
        }
        if !tags.insert(l.tag.as_str()) {
            return Err(ConfigError::Validation(format!(
                "inbounds: duplicate tag '{}'",
                l.tag
            )));
        }
        if l.port == 0 {
            return Err(ConfigError::Validation(format!(
                "inbound {}: port must be 1..=65535",
                l.tag
            )));
        }
        if !ports.insert(l.port) {
            return Err(ConfigError::Validation(format!(
                "inbound {}: port {} bound twice",
                l.tag, l.port
            )));
        }
    }

    for (tag, protocol) in REQUIRED_LISTENERS {
        match doc.listener(tag) {
            Some(l) if l.protocol == protocol => {}
            Some(l) => {
                return Err(ConfigError::Validation(format!(
                    "inbound {tag}: expected protocol {protocol}, found {}",
                    l.protocol
                )));
            }
            None => {
                return Err(ConfigError::Validation(format!(
                    "inbounds: missing '{tag}' listener"
                )));
            }
        }
    }

    if doc.listener(TAG_CONTROL).is_some_and(|l| !l.is_loopback()) {
        return Err(ConfigError::Validation(
            "inbound api: control listener must bind loopback".into(),
        ));
    }

    let diag = doc.listener(TAG_DIAGNOSTIC_IN);
    match doc.role() {
        Role::Edge if diag.is_none_or(|l| !l.is_loopback() || l.authenticated) => {
            Err(ConfigError::Validation(
                "inbound diag-in: edge nodes need a loopback no-auth diagnostic listener".into(),
            ))
        }
        Role::Gateway if diag.is_some() => Err(ConfigError::Validation(
            "inbound diag-in: gateway nodes have no diagnostic listener".into(),
        )),
        _ => Ok(()),
    }
}

fn validate_accounts(doc: &ConfigDocument) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (i, a) in doc.accounts.iter().enumerate() {
        if a.identifier.is_empty() {
            return Err(ConfigError::Validation(format!(
                "accounts[{i}]: empty identifier"
            )));
        }
        if a.secret.is_empty() {
            return Err(ConfigError::Validation(format!(
                "accounts[{i}] ({}): empty secret",
                a.identifier
            )));
        }
        if a.method.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "accounts[{i}] ({}): empty cipher method",
                a.identifier
            )));
        }
        if !seen.insert(a.identifier.as_str()) {
            return Err(ConfigError::Validation(format!(
                "accounts: duplicate identifier '{}'",
                a.identifier
            )));
        }
    }
    Ok(())
}

fn validate_outbounds(doc: &ConfigDocument) -> Result<(), ConfigError> {
    let mut tags: Vec<&str> = doc.outbounds.iter().map(|o| o.tag.as_str()).collect();
    tags.sort_unstable();
    let mut expected = doc.role().outbound_tags().to_vec();
    expected.sort_unstable();
    if tags != expected {
        return Err(ConfigError::Validation(format!(
            "outbounds: {} node expects {:?}, found {:?}",
            doc.role(),
            doc.role().outbound_tags(),
            tags
        )));
    }

    if let Some(up) = doc.upstream() {
        if !is_valid_address(&up.address) {
            return Err(ConfigError::Validation(format!(
                "outbound relay: invalid address '{}'",
                up.address
            )));
        }
        if up.port == 0 {
            return Err(ConfigError::Validation(
                "outbound relay: port must be 1..=65535".into(),
            ));
        }
        if up.secret.is_empty() {
            return Err(ConfigError::Validation(
                "outbound relay: empty secret".into(),
            ));
        }
    }
    Ok(())
}

fn validate_routing(doc: &ConfigDocument) -> Result<(), ConfigError> {
    let legal = doc.role().outbound_tags();
    for (i, r) in doc.routing.custom().iter().enumerate() {
        let n = i + 1;
        if !legal.contains(&r.outbound_tag.as_str()) {
            return Err(ConfigError::Validation(format!(
                "custom rule {n}: outbound '{}' not available on a {} node",
                r.outbound_tag,
                doc.role()
            )));
        }
        if r.values.is_empty() || r.values.iter().any(|v| v.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "custom rule {n}: empty {} value",
                r.kind
            )));
        }
    }

    if let Some(c) = doc.routing.catch_all() {
        if c.outbound_tag != TAG_UPSTREAM {
            return Err(ConfigError::Validation(format!(
                "catch-all rule must target '{TAG_UPSTREAM}', found '{}'",
                c.outbound_tag
            )));
        }
        if c.inbound_tags.is_empty() {
            return Err(ConfigError::Validation(
                "catch-all rule matches no listeners".into(),
            ));
        }
        if let Some(tag) = c.inbound_tags.iter().find(|t| doc.listener(t).is_none()) {
            return Err(ConfigError::Validation(format!(
                "catch-all rule references unknown listener '{tag}'"
            )));
        }
    }
    Ok(())
}

fn validate_log(doc: &ConfigDocument) -> Result<(), ConfigError> {
    let disabled = doc.log.level == LogLevel::None;
    let has_paths = doc.log.access.is_some() || doc.log.error.is_some();
    if disabled && has_paths {
        return Err(ConfigError::Validation(
            "log: level none must not name log files".into(),
        ));
    }
    Ok(())
}
