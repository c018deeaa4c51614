//! Checked configuration document model.
//!
//! Accounts are stored once and projected into every authenticated
//! listener's account list when the document is serialized, so the
//! relay-cipher, http and socks lists can never disagree.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use relayctl_core::defaults::{
    DEFAULT_ACCESS_LOG, DEFAULT_CIPHER_METHOD, DEFAULT_ERROR_LOG, LOG_DISABLED, LOOPBACK_BIND,
    SCHEMA_VERSION, TAG_BLACKHOLE, TAG_CONTROL, TAG_DIRECT, TAG_UPSTREAM,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::loader::ConfigError;
use crate::routing::{
    CatchAllRule, ControlRule, CustomRule, MatchKind, PRIVATE_IP_SELECTOR, PrivateBlockRule,
    RoutingTable, Rule,
};
use crate::types::*;

/// Node role in the two-tier topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Exit node with direct internet egress.
    Gateway,
    /// Entry node forwarding client traffic to an upstream relay.
    Edge,
}

impl Role {
    /// Outbound tags a rule may target on this role.
    pub fn outbound_tags(self) -> &'static [&'static str] {
        match self {
            Role::Gateway => &[TAG_DIRECT, TAG_BLACKHOLE],
            Role::Edge => &[TAG_UPSTREAM, TAG_DIRECT, TAG_BLACKHOLE],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Gateway => f.write_str("gateway"),
            Role::Edge => f.write_str("edge"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerProtocol {
    RelayCipher,
    Http,
    Socks,
    Control,
}

impl ListenerProtocol {
    /// Engine protocol name.
    pub fn wire_name(self) -> &'static str {
        match self {
            ListenerProtocol::RelayCipher => "shadowsocks",
            ListenerProtocol::Http => "http",
            ListenerProtocol::Socks => "socks",
            ListenerProtocol::Control => "dokodemo-door",
        }
    }

    fn from_wire(name: &str) -> Option<Self> {
        match name {
            "shadowsocks" => Some(ListenerProtocol::RelayCipher),
            "http" => Some(ListenerProtocol::Http),
            "socks" => Some(ListenerProtocol::Socks),
            "dokodemo-door" => Some(ListenerProtocol::Control),
            _ => None,
        }
    }
}

impl fmt::Display for ListenerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Engine keys of an inbound or outbound that the model does not describe.
/// They are written back unchanged on every edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unmanaged {
    /// Keys beside `tag`, `protocol` and `settings` (`sniffing`, `streamSettings`, `mux` ...).
    pub fields: Map<String, Value>,
    /// Keys inside `settings` that are not derived from the model.
    pub settings: Map<String, Value>,
}

/// A bound network endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub tag: String,
    pub protocol: ListenerProtocol,
    pub port: u16,
    pub listen: String,
    /// Whether the listener carries the shared account list.
    pub authenticated: bool,
    pub unmanaged: Unmanaged,
}

impl Listener {
    /// Client-facing traffic listener (everything except control).
    pub fn is_client_facing(&self) -> bool {
        self.protocol != ListenerProtocol::Control
    }

    pub fn is_loopback(&self) -> bool {
        self.listen == LOOPBACK_BIND
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub identifier: String,
    pub secret: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRelay {
    pub address: String,
    pub port: u16,
    pub secret: String,
    pub method: String,
    /// Other keys of the server entry (`level`, `uot`, ...).
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundKind {
    Direct,
    Blackhole,
    UpstreamRelay(UpstreamRelay),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub tag: String,
    pub kind: OutboundKind,
    pub unmanaged: Unmanaged,
}

impl Outbound {
    pub fn direct() -> Self {
        Self {
            tag: TAG_DIRECT.to_string(),
            kind: OutboundKind::Direct,
            unmanaged: Unmanaged::default(),
        }
    }

    pub fn blackhole() -> Self {
        Self {
            tag: TAG_BLACKHOLE.to_string(),
            kind: OutboundKind::Blackhole,
            unmanaged: Unmanaged::default(),
        }
    }

    pub fn upstream(relay: UpstreamRelay) -> Self {
        Self {
            tag: TAG_UPSTREAM.to_string(),
            kind: OutboundKind::UpstreamRelay(relay),
            unmanaged: Unmanaged::default(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            OutboundKind::Direct => "direct",
            OutboundKind::Blackhole => "blackhole",
            OutboundKind::UpstreamRelay(_) => "upstream-relay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    None,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::None => "none",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(LogLevel::None),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(ConfigError::InvalidInput(format!(
                "unknown log level '{other}' (expected none, warning, info or debug)"
            ))),
        }
    }
}

/// Log level plus the derived file paths (`None` = disabled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub access: Option<PathBuf>,
    pub error: Option<PathBuf>,
}

impl LogSettings {
    pub fn standard(level: LogLevel) -> Self {
        match level {
            LogLevel::None => Self {
                level,
                access: None,
                error: None,
            },
            _ => Self {
                level,
                access: Some(PathBuf::from(DEFAULT_ACCESS_LOG)),
                error: Some(PathBuf::from(DEFAULT_ERROR_LOG)),
            },
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self::standard(LogLevel::Warning)
    }
}

/// Document-level content the model does not describe.
#[derive(Debug, Clone, PartialEq)]
struct Passthrough {
    /// Top-level sections (`dns`, `transport`, ...).
    sections: Map<String, Value>,
    log: Map<String, Value>,
    domain_strategy: String,
    routing: Map<String, Value>,
    /// Control API services besides the stats service.
    api_services: Vec<String>,
    /// Policy as found on disk, when it holds more than the stats counters.
    policy: Option<Value>,
}

impl Passthrough {
    fn fresh() -> Self {
        Self {
            sections: Map::new(),
            log: Map::new(),
            domain_strategy: crate::defaults::default_domain_strategy(),
            routing: Map::new(),
            api_services: Vec::new(),
            policy: None,
        }
    }
}

/// The relay's configuration: single source of truth for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    role: Role,
    pub schema_version: String,
    pub listeners: Vec<Listener>,
    pub accounts: Vec<Account>,
    pub outbounds: Vec<Outbound>,
    pub routing: RoutingTable,
    pub log: LogSettings,
    passthrough: Passthrough,
}

impl ConfigDocument {
    pub(crate) fn new(
        role: Role,
        listeners: Vec<Listener>,
        accounts: Vec<Account>,
        outbounds: Vec<Outbound>,
        routing: RoutingTable,
    ) -> Self {
        Self {
            role,
            schema_version: SCHEMA_VERSION.to_string(),
            listeners,
            accounts,
            outbounds,
            routing,
            log: LogSettings::default(),
            passthrough: Passthrough::fresh(),
        }
    }

    /// Role fixed at creation time.
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn listener(&self, tag: &str) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.tag == tag)
    }

    pub fn listener_mut(&mut self, tag: &str) -> Option<&mut Listener> {
        self.listeners.iter_mut().find(|l| l.tag == tag)
    }

    /// First listener of the given protocol that carries accounts.
    pub fn account_listener(&self, protocol: ListenerProtocol) -> Option<&Listener> {
        self.listeners
            .iter()
            .find(|l| l.protocol == protocol && l.authenticated)
    }

    pub fn outbound(&self, tag: &str) -> Option<&Outbound> {
        self.outbounds.iter().find(|o| o.tag == tag)
    }

    pub fn upstream(&self) -> Option<&UpstreamRelay> {
        self.outbounds.iter().find_map(|o| match o.kind {
            OutboundKind::UpstreamRelay(ref r) => Some(r),
            _ => None,
        })
    }

    pub fn upstream_mut(&mut self) -> Option<&mut UpstreamRelay> {
        self.outbounds.iter_mut().find_map(|o| match o.kind {
            OutboundKind::UpstreamRelay(ref mut r) => Some(r),
            _ => None,
        })
    }

    pub fn account(&self, identifier: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.identifier == identifier)
    }

    // ── Wire conversion ──

    /// Build the checked model from the engine's JSON layout.
    pub fn from_wire(wire: XrayConfig) -> Result<Self, ConfigError> {
        let XrayConfig {
            relayctl,
            log,
            api,
            policy,
            inbounds,
            outbounds,
            routing,
            extra,
            ..
        } = wire;

        let outbounds = outbounds
            .into_iter()
            .map(outbound_from_wire)
            .collect::<Result<Vec<_>, _>>()?;

        let inferred = if outbounds.iter().any(|o| o.tag == TAG_UPSTREAM) {
            Role::Edge
        } else {
            Role::Gateway
        };
        let (role, schema_version) = match relayctl {
            Some(meta) => (meta.role, meta.schema),
            None => (inferred, SCHEMA_VERSION.to_string()),
        };
        if role != inferred {
            return Err(ConfigError::Validation(format!(
                "document is marked {role} but its outbounds describe a {inferred} node"
            )));
        }

        let (listeners, accounts) = listeners_from_wire(inbounds)?;

        let RoutingObject {
            domain_strategy,
            rules,
            extra: routing_extra,
        } = routing;
        let last = rules.len().saturating_sub(1);
        let rules = rules
            .into_iter()
            .enumerate()
            .map(|(i, r)| rule_from_wire(role, i, i == last, r))
            .collect::<Result<Vec<_>, _>>()?;
        let routing = RoutingTable::from_rules(role, rules)?;

        let (log, log_extra) = log_from_wire(log)?;
        let passthrough = Passthrough {
            sections: extra,
            log: log_extra,
            domain_strategy,
            routing: routing_extra,
            api_services: api
                .map(|a| a.services)
                .unwrap_or_default()
                .into_iter()
                .filter(|s| s != STATS_SERVICE)
                .collect(),
            policy: policy
                .map(|p| with_stats_counters(Some(p)))
                .filter(|p| *p != stats_policy()),
        };

        Ok(Self {
            role,
            schema_version,
            listeners,
            accounts,
            outbounds,
            routing,
            log,
            passthrough,
        })
    }

    /// Project the model into the engine's JSON layout.
    pub fn to_wire(&self) -> XrayConfig {
        XrayConfig {
            relayctl: Some(MetaObject {
                schema: self.schema_version.clone(),
                role: self.role,
            }),
            log: LogObject {
                loglevel: self.log.level.as_str().to_string(),
                access: path_or_disabled(self.log.access.as_ref()),
                error: path_or_disabled(self.log.error.as_ref()),
                extra: self.passthrough.log.clone(),
            },
            api: Some(ApiObject {
                tag: TAG_CONTROL.to_string(),
                services: std::iter::once(STATS_SERVICE.to_string())
                    .chain(self.passthrough.api_services.iter().cloned())
                    .collect(),
            }),
            stats: Some(json!({})),
            policy: Some(with_stats_counters(self.passthrough.policy.clone())),
            inbounds: self
                .listeners
                .iter()
                .map(|l| self.inbound_to_wire(l))
                .collect(),
            outbounds: self.outbounds.iter().map(outbound_to_wire).collect(),
            routing: RoutingObject {
                domain_strategy: self.passthrough.domain_strategy.clone(),
                rules: self.routing.rules().iter().map(rule_to_wire).collect(),
                extra: self.passthrough.routing.clone(),
            },
            extra: self.passthrough.sections.clone(),
        }
    }

    fn inbound_to_wire(&self, l: &Listener) -> InboundObject {
        let user_pass = || -> Value {
            self.accounts
                .iter()
                .map(|a| json!({ "user": a.identifier, "pass": a.secret }))
                .collect()
        };

        let mut settings = default_settings(l.protocol, l.authenticated);
        settings.extend(l.unmanaged.settings.clone());
        match (l.protocol, l.authenticated) {
            (ListenerProtocol::Control, _) => {
                settings.insert("address".into(), json!(LOOPBACK_BIND));
            }
            (ListenerProtocol::RelayCipher, _) => {
                let clients = self
                    .accounts
                    .iter()
                    .map(|a| {
                        json!({
                            "email": a.identifier,
                            "password": a.secret,
                            "method": a.method,
                        })
                    })
                    .collect();
                settings.insert("clients".into(), clients);
            }
            (ListenerProtocol::Http, true) => {
                settings.insert("accounts".into(), user_pass());
            }
            (ListenerProtocol::Http, false) => {}
            (ListenerProtocol::Socks, true) => {
                settings.insert("auth".into(), json!("password"));
                settings.insert("accounts".into(), user_pass());
            }
            (ListenerProtocol::Socks, false) => {
                settings.insert("auth".into(), json!("noauth"));
            }
        }

        InboundObject {
            tag: l.tag.clone(),
            listen: l.listen.clone(),
            port: l.port,
            protocol: l.protocol.wire_name().to_string(),
            settings: Value::Object(settings),
            extra: l.unmanaged.fields.clone(),
        }
    }

    /// One-line-per-field summary for display.
    pub fn summary(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("role".to_string(), self.role.to_string()),
            ("schema".to_string(), self.schema_version.clone()),
        ];
        for l in &self.listeners {
            out.push((
                format!("listener {}", l.tag),
                format!("{} {}:{}", l.protocol, l.listen, l.port),
            ));
        }
        for o in &self.outbounds {
            let detail = match o.kind {
                OutboundKind::UpstreamRelay(ref r) => {
                    format!("{} -> {}:{} ({})", o.kind_name(), r.address, r.port, r.method)
                }
                _ => o.kind_name().to_string(),
            };
            out.push((format!("outbound {}", o.tag), detail));
        }
        out.push(("accounts".to_string(), self.accounts.len().to_string()));
        out.push((
            "rules".to_string(),
            format!(
                "{} ({} custom)",
                self.routing.len(),
                self.routing.custom().len()
            ),
        ));
        out.push(("log level".to_string(), self.log.level.to_string()));
        out
    }
}

fn path_or_disabled(p: Option<&PathBuf>) -> String {
    p.map(|p| p.display().to_string())
        .unwrap_or_else(|| LOG_DISABLED.to_string())
}

const STATS_SERVICE: &str = "StatsService";

fn stats_policy() -> Value {
    with_stats_counters(None)
}

/// Switch on the per-user and per-inbound counters the stats query reads,
/// keeping every other policy setting.
fn with_stats_counters(policy: Option<Value>) -> Value {
    let mut policy = match policy {
        Some(Value::Object(m)) => m,
        _ => Map::new(),
    };
    let mut set = |path: &[&str], flags: &[&str]| {
        let mut node = &mut policy;
        for key in path {
            let entry = node.entry(key.to_string()).or_insert_with(|| json!({}));
            if !entry.is_object() {
                *entry = json!({});
            }
            node = match entry {
                Value::Object(m) => m,
                _ => return,
            };
        }
        for flag in flags {
            node.insert(flag.to_string(), Value::Bool(true));
        }
    };
    set(&["levels", "0"], &["statsUserUplink", "statsUserDownlink"]);
    set(
        &["system"],
        &[
            "statsInboundUplink",
            "statsInboundDownlink",
            "statsOutboundUplink",
            "statsOutboundDownlink",
        ],
    );
    Value::Object(policy)
}

/// `settings` keys rebuilt from the model on every write.
fn managed_settings_keys(protocol: ListenerProtocol) -> &'static [&'static str] {
    match protocol {
        ListenerProtocol::Control => &["address"],
        ListenerProtocol::RelayCipher => &["clients"],
        ListenerProtocol::Http => &["accounts"],
        ListenerProtocol::Socks => &["auth", "accounts"],
    }
}

/// `settings` values written when the document does not set them.
fn default_settings(protocol: ListenerProtocol, authenticated: bool) -> Map<String, Value> {
    let mut m = Map::new();
    match (protocol, authenticated) {
        (ListenerProtocol::RelayCipher, _) => {
            m.insert("network".into(), json!("tcp,udp"));
        }
        (ListenerProtocol::Http, true) => {
            m.insert("allowTransparent".into(), json!(false));
        }
        (ListenerProtocol::Socks, _) => {
            m.insert("udp".into(), json!(true));
        }
        _ => {}
    }
    m
}

/// Keys of `settings` that neither come from the model nor match a default.
fn unmanaged_settings(
    protocol: ListenerProtocol,
    authenticated: bool,
    settings: &Value,
) -> Map<String, Value> {
    let Some(obj) = settings.as_object() else {
        return Map::new();
    };
    let managed = managed_settings_keys(protocol);
    let defaults = default_settings(protocol, authenticated);
    obj.iter()
        .filter(|(k, v)| !managed.contains(&k.as_str()) && defaults.get(k.as_str()) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn settings_of<T: serde::de::DeserializeOwned + Default>(
    tag: &str,
    settings: Value,
) -> Result<T, ConfigError> {
    if settings.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(settings)
        .map_err(|e| ConfigError::Validation(format!("inbound {tag}: bad settings: {e}")))
}

type AccountPairs = BTreeMap<String, String>;

fn listeners_from_wire(
    inbounds: Vec<InboundObject>,
) -> Result<(Vec<Listener>, Vec<Account>), ConfigError> {
    let mut listeners = Vec::with_capacity(inbounds.len());
    let mut relay_accounts: Option<Vec<Account>> = None;
    let mut other_lists: Vec<(String, AccountPairs)> = Vec::new();

    for inbound in inbounds {
        let InboundObject {
            tag,
            listen,
            port,
            protocol,
            settings,
            extra,
        } = inbound;
        let protocol = ListenerProtocol::from_wire(&protocol).ok_or_else(|| {
            ConfigError::Validation(format!("inbound {tag}: unsupported protocol '{protocol}'"))
        })?;

        let raw_settings = settings.clone();
        let authenticated = match protocol {
            ListenerProtocol::Control => false,
            ListenerProtocol::RelayCipher => {
                let ss: ShadowsocksInbound = settings_of(&tag, settings)?;
                if relay_accounts.is_none() {
                    let default_method = ss
                        .method
                        .unwrap_or_else(|| DEFAULT_CIPHER_METHOD.to_string());
                    let clients = ss.clients.ok_or_else(|| {
                        ConfigError::NotConfigured(format!("inbound {tag} has no client list"))
                    })?;
                    relay_accounts = Some(
                        clients
                            .into_iter()
                            .map(|c| Account {
                                identifier: c.email,
                                secret: c.password,
                                method: c.method.unwrap_or_else(|| default_method.clone()),
                            })
                            .collect(),
                    );
                }
                true
            }
            ListenerProtocol::Http | ListenerProtocol::Socks => {
                let up: UserPassInbound = settings_of(&tag, settings)?;
                let authenticated = match protocol {
                    ListenerProtocol::Socks => up.auth.as_deref() == Some("password"),
                    _ => up.accounts.is_some(),
                };
                if authenticated {
                    let pairs = up
                        .accounts
                        .unwrap_or_default()
                        .into_iter()
                        .map(|a| (a.user, a.pass))
                        .collect();
                    other_lists.push((tag.clone(), pairs));
                }
                authenticated
            }
        };

        let unmanaged = Unmanaged {
            fields: extra,
            settings: unmanaged_settings(protocol, authenticated, &raw_settings),
        };
        listeners.push(Listener {
            tag,
            protocol,
            port,
            listen,
            authenticated,
            unmanaged,
        });
    }

    let accounts = relay_accounts
        .ok_or_else(|| ConfigError::NotConfigured("no relay-cipher listener".into()))?;

    let canonical: AccountPairs = accounts
        .iter()
        .map(|a| (a.identifier.clone(), a.secret.clone()))
        .collect();
    if canonical.len() != accounts.len() {
        return Err(ConfigError::Validation(
            "relay-cipher client list contains duplicate identifiers".into(),
        ));
    }
    for (tag, pairs) in other_lists {
        if pairs != canonical {
            return Err(ConfigError::Validation(format!(
                "inbound {tag}: account list out of sync with the relay-cipher listener"
            )));
        }
    }

    Ok((listeners, accounts))
}

fn outbound_from_wire(o: OutboundObject) -> Result<Outbound, ConfigError> {
    let OutboundObject {
        tag,
        protocol,
        settings,
        extra,
    } = o;
    let bad_settings = |e: serde_json::Error| {
        ConfigError::Validation(format!("outbound {tag}: bad settings: {e}"))
    };

    let (kind, settings) = match protocol.as_str() {
        "freedom" | "blackhole" => {
            let settings = match settings {
                Value::Null => Map::new(),
                other => serde_json::from_value(other).map_err(bad_settings)?,
            };
            let kind = if protocol == "freedom" {
                OutboundKind::Direct
            } else {
                OutboundKind::Blackhole
            };
            (kind, settings)
        }
        "shadowsocks" => {
            let ShadowsocksOutbound { servers, extra } =
                serde_json::from_value(settings).map_err(bad_settings)?;
            let mut servers = servers.into_iter();
            let server = match (servers.next(), servers.next()) {
                (Some(server), None) => server,
                (None, _) => {
                    return Err(ConfigError::Validation(format!(
                        "outbound {tag}: no upstream server"
                    )));
                }
                (Some(_), Some(_)) => {
                    return Err(ConfigError::Validation(format!(
                        "outbound {tag}: more than one upstream server"
                    )));
                }
            };
            let relay = UpstreamRelay {
                address: server.address,
                port: server.port,
                secret: server.password,
                method: server.method,
                options: server.extra,
            };
            (OutboundKind::UpstreamRelay(relay), extra)
        }
        other => {
            return Err(ConfigError::Validation(format!(
                "outbound {tag}: unsupported protocol '{other}'"
            )));
        }
    };
    Ok(Outbound {
        tag,
        kind,
        unmanaged: Unmanaged {
            fields: extra,
            settings,
        },
    })
}

fn outbound_to_wire(o: &Outbound) -> OutboundObject {
    let mut settings = o.unmanaged.settings.clone();
    let protocol = match o.kind {
        OutboundKind::Direct => "freedom",
        OutboundKind::Blackhole => "blackhole",
        OutboundKind::UpstreamRelay(ref r) => {
            let mut server = r.options.clone();
            server.insert("address".into(), json!(r.address));
            server.insert("port".into(), json!(r.port));
            server.insert("method".into(), json!(r.method));
            server.insert("password".into(), json!(r.secret));
            settings.insert("servers".into(), json!([server]));
            "shadowsocks"
        }
    };
    OutboundObject {
        tag: o.tag.clone(),
        protocol: protocol.to_string(),
        settings: if settings.is_empty() {
            Value::Null
        } else {
            Value::Object(settings)
        },
        extra: o.unmanaged.fields.clone(),
    }
}

/// Classify a wire rule by its `ruleTag`, or structurally when untagged.
fn rule_from_wire(
    role: Role,
    index: usize,
    is_last: bool,
    r: RuleObject,
) -> Result<Rule, ConfigError> {
    let provenance = match r.rule_tag.as_deref() {
        Some(tag) => tag.to_string(),
        None => {
            let plain = r.extra.is_empty();
            let control =
                plain && r.inbound_tag == [TAG_CONTROL] && r.outbound_tag == TAG_CONTROL;
            let private =
                plain && r.ip == [PRIVATE_IP_SELECTOR] && r.outbound_tag == TAG_BLACKHOLE;
            let catch_all = plain && !r.inbound_tag.is_empty() && r.outbound_tag == TAG_UPSTREAM;
            match (role, index) {
                (_, 0) if control => "control".into(),
                (Role::Gateway, 1) if private => "private-block".into(),
                (Role::Edge, _) if is_last && catch_all => "catch-all".into(),
                _ => "custom".into(),
            }
        }
    };

    if provenance != "custom" && !r.extra.is_empty() {
        let keys: Vec<&str> = r.extra.keys().map(String::as_str).collect();
        return Err(ConfigError::Validation(format!(
            "routing.rules[{index}]: {provenance} rule has unsupported keys: {}",
            keys.join(", ")
        )));
    }

    let rule = match provenance.as_str() {
        "control" => Rule::BuiltinControl(ControlRule {
            inbound_tag: r.inbound_tag.into_iter().next().unwrap_or_default(),
            outbound_tag: r.outbound_tag,
        }),
        "private-block" => Rule::BuiltinPrivateBlock(PrivateBlockRule {
            ips: r.ip,
            outbound_tag: r.outbound_tag,
        }),
        "catch-all" => Rule::BuiltinCatchAll(CatchAllRule {
            inbound_tags: r.inbound_tag,
            outbound_tag: r.outbound_tag,
        }),
        "custom" => {
            if !r.inbound_tag.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "routing.rules[{index}]: custom rules cannot match on inboundTag"
                )));
            }
            let (kind, values) = match (r.domain.is_empty(), r.ip.is_empty()) {
                (false, true) => (MatchKind::Domain, r.domain),
                (true, false) => (MatchKind::Ip, r.ip),
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "routing.rules[{index}]: custom rules match either domain or ip"
                    )));
                }
            };
            Rule::Custom(CustomRule {
                kind,
                values,
                outbound_tag: r.outbound_tag,
                extra: r.extra,
            })
        }
        other => {
            return Err(ConfigError::Validation(format!(
                "routing.rules[{index}]: unknown ruleTag '{other}'"
            )));
        }
    };
    Ok(rule)
}

fn rule_to_wire(rule: &Rule) -> RuleObject {
    let mut obj = RuleObject {
        kind: crate::defaults::default_rule_type(),
        rule_tag: Some(rule.provenance().to_string()),
        inbound_tag: Vec::new(),
        domain: Vec::new(),
        ip: Vec::new(),
        outbound_tag: rule.outbound_tag().to_string(),
        extra: Map::new(),
    };
    match rule {
        Rule::BuiltinControl(r) => obj.inbound_tag = vec![r.inbound_tag.clone()],
        Rule::BuiltinPrivateBlock(r) => obj.ip = r.ips.clone(),
        Rule::BuiltinCatchAll(r) => obj.inbound_tag = r.inbound_tags.clone(),
        Rule::Custom(r) => {
            match r.kind {
                MatchKind::Domain => obj.domain = r.values.clone(),
                MatchKind::Ip => obj.ip = r.values.clone(),
            }
            obj.extra = r.extra.clone();
        }
    }
    obj
}

fn log_from_wire(log: LogObject) -> Result<(LogSettings, Map<String, Value>), ConfigError> {
    let level: LogLevel = log.loglevel.parse().map_err(|_| {
        ConfigError::Validation(format!("log.loglevel '{}' unsupported", log.loglevel))
    })?;
    let path = |p: String| (!p.is_empty() && p != LOG_DISABLED).then(|| PathBuf::from(p));
    let settings = LogSettings {
        level,
        access: path(log.access),
        error: path(log.error),
    };
    Ok((settings, log.extra))
}
