//! On-disk (engine JSON) representation of the configuration document.
//!
//! These types mirror the engine's schema closely and carry no invariants of
//! their own; [`crate::ConfigDocument`] is the checked model built from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::defaults::*;
use crate::document::Role;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XrayConfig {
    /// Management metadata written by this tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayctl: Option<MetaObject>,
    #[serde(default)]
    pub log: LogObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
    #[serde(default)]
    pub inbounds: Vec<InboundObject>,
    #[serde(default)]
    pub outbounds: Vec<OutboundObject>,
    #[serde(default)]
    pub routing: RoutingObject,
    /// Sections this tool does not manage (dns, transport, ...), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaObject {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogObject {
    #[serde(default = "default_log_level")]
    pub loglevel: String,
    #[serde(default = "default_log_path")]
    pub access: String,
    #[serde(default = "default_log_path")]
    pub error: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for LogObject {
    fn default() -> Self {
        Self {
            loglevel: default_log_level(),
            access: default_log_path(),
            error: default_log_path(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiObject {
    pub tag: String,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundObject {
    pub tag: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    pub port: u16,
    pub protocol: String,
    #[serde(default)]
    pub settings: Value,
    /// `sniffing`, `streamSettings` and anything else beside the managed keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundObject {
    pub tag: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub settings: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingObject {
    #[serde(default = "default_domain_strategy")]
    pub domain_strategy: String,
    #[serde(default)]
    pub rules: Vec<RuleObject>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RoutingObject {
    fn default() -> Self {
        Self {
            domain_strategy: default_domain_strategy(),
            rules: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleObject {
    #[serde(rename = "type", default = "default_rule_type")]
    pub kind: String,
    /// Rule provenance (`control`, `private-block`, `catch-all`, `custom`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbound_tag: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip: Vec<String>,
    pub outbound_tag: String,
    /// Further predicates (`port`, `network`, `source`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Protocol settings ──

/// `settings` of a shadowsocks inbound.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShadowsocksInbound {
    #[serde(default)]
    pub clients: Option<Vec<ShadowsocksClient>>,
    /// Server-wide method, used when a client omits its own.
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadowsocksClient {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub method: Option<String>,
}

/// `settings` of an http or socks inbound.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPassInbound {
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub accounts: Option<Vec<UserPass>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserPass {
    pub user: String,
    pub pass: String,
}

/// `settings` of a shadowsocks outbound.
#[derive(Debug, Clone, Deserialize)]
pub struct ShadowsocksOutbound {
    pub servers: Vec<ShadowsocksServer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadowsocksServer {
    pub address: String,
    pub port: u16,
    pub method: String,
    pub password: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
