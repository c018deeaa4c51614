//! Traffic statistics from the engine's local query endpoint.
//!
//! Counter names have the form `<scope>>>><name>>>>traffic>>>{uplink|downlink}`,
//! e.g. `user>>>alice>>>traffic>>>uplink`. Totals are built by prefix match
//! and summation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::error::EngineError;
use crate::retry::{RetryPolicy, with_retries};

const SEP: &str = ">>>";

/// One raw counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    pub name: String,
    pub value: u64,
}

/// Summed traffic of one subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traffic {
    pub uplink: u64,
    pub downlink: u64,
}

impl Traffic {
    pub fn total(&self) -> u64 {
        self.uplink.saturating_add(self.downlink)
    }
}

/// Counter scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    User,
    Inbound,
    Outbound,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Inbound => "inbound",
            Scope::Outbound => "outbound",
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    stat: Vec<RawCounter>,
}

#[derive(Debug, Deserialize)]
struct RawCounter {
    name: String,
    /// int64 values arrive as JSON strings; zero values are omitted.
    #[serde(default)]
    value: Value,
}

/// Parse the JSON printed by `api statsquery`.
pub fn parse_counters(output: &str) -> Result<Vec<Counter>, EngineError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let resp: QueryResponse = serde_json::from_str(trimmed)?;
    resp.stat
        .into_iter()
        .map(|raw| {
            let value = match raw.value {
                Value::Null => 0,
                Value::Number(ref n) => n.as_u64().unwrap_or(0),
                Value::String(ref s) => s.parse::<u64>().map_err(|_| {
                    EngineError::StatsFormat(format!("{}: bad value '{s}'", raw.name))
                })?,
                other => {
                    return Err(EngineError::StatsFormat(format!(
                        "{}: bad value {other}",
                        raw.name
                    )));
                }
            };
            Ok(Counter {
                name: raw.name,
                value,
            })
        })
        .collect()
}

/// Sum every counter whose name starts with `prefix`.
pub fn sum_prefix(counters: &[Counter], prefix: &str) -> Traffic {
    let mut t = Traffic::default();
    for c in counters.iter().filter(|c| c.name.starts_with(prefix)) {
        if c.name.ends_with("uplink") {
            t.uplink = t.uplink.saturating_add(c.value);
        } else if c.name.ends_with("downlink") {
            t.downlink = t.downlink.saturating_add(c.value);
        }
    }
    t
}

/// Totals for a single subject, e.g. `traffic_of(c, Scope::User, "alice")`.
pub fn traffic_of(counters: &[Counter], scope: Scope, name: &str) -> Traffic {
    sum_prefix(
        counters,
        &format!("{}{SEP}{name}{SEP}traffic{SEP}", scope.as_str()),
    )
}

/// Totals for every subject seen in `scope`, keyed by name.
pub fn by_scope(counters: &[Counter], scope: Scope) -> BTreeMap<String, Traffic> {
    let head = format!("{}{SEP}", scope.as_str());
    let mut out = BTreeMap::new();
    for c in counters {
        let Some(rest) = c.name.strip_prefix(&head) else {
            continue;
        };
        let Some((name, _)) = rest.split_once(SEP) else {
            continue;
        };
        out.entry(name.to_string())
            .or_insert_with(|| traffic_of(counters, scope, name));
    }
    out
}

/// Render a byte count with binary units.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Client for the engine's stats endpoint (`<bin> api statsquery`).
#[derive(Debug, Clone)]
pub struct StatsClient {
    bin: PathBuf,
    server: String,
    policy: RetryPolicy,
}

impl StatsClient {
    pub fn new(bin: impl Into<PathBuf>, control_port: u16) -> Self {
        Self {
            bin: bin.into(),
            server: format!("{}:{control_port}", relayctl_core::LOOPBACK_BIND),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch all counters; `reset` zeroes them on the engine side.
    pub async fn query(&self, reset: bool) -> Result<Vec<Counter>, EngineError> {
        if !self.bin.exists() {
            return Err(EngineError::EngineMissing(self.bin.clone()));
        }
        let output = with_retries("stats query", self.policy, || self.query_once(reset)).await?;
        parse_counters(&output)
    }

    async fn query_once(&self, reset: bool) -> Result<String, EngineError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["api", "statsquery"])
            .arg(format!("--server={}", self.server))
            .kill_on_drop(true);
        if reset {
            cmd.arg("-reset");
        }
        debug!(server = %self.server, reset, "querying engine stats");
        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(EngineError::Service(format!(
                "statsquery exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "stat": [
            { "name": "user>>>alice>>>traffic>>>uplink", "value": "1000" },
            { "name": "user>>>alice>>>traffic>>>downlink", "value": "3000" },
            { "name": "user>>>bob>>>traffic>>>uplink", "value": 5 },
            { "name": "user>>>bob>>>traffic>>>downlink" },
            { "name": "user>>>alice2>>>traffic>>>uplink", "value": "7" },
            { "name": "inbound>>>ss-in>>>traffic>>>uplink", "value": "1005" },
            { "name": "inbound>>>ss-in>>>traffic>>>downlink", "value": "3000" }
        ]
    }"#;

    #[test]
    fn parses_string_number_and_missing_values() {
        let c = parse_counters(SAMPLE).unwrap();
        assert_eq!(c.len(), 7);
        assert_eq!(c[0].value, 1000);
        assert_eq!(c[2].value, 5);
        assert_eq!(c[3].value, 0);
    }

    #[test]
    fn empty_output_has_no_counters() {
        assert!(parse_counters("  \n").unwrap().is_empty());
        assert!(parse_counters("{}").unwrap().is_empty());
    }

    #[test]
    fn bad_value_is_reported() {
        let err = parse_counters(r#"{"stat":[{"name":"x","value":"many"}]}"#).unwrap_err();
        assert!(matches!(err, EngineError::StatsFormat(_)));
    }

    #[test]
    fn prefix_does_not_bleed_into_similar_names() {
        let c = parse_counters(SAMPLE).unwrap();
        let alice = traffic_of(&c, Scope::User, "alice");
        assert_eq!(alice, Traffic { uplink: 1000, downlink: 3000 });
        assert_eq!(alice.total(), 4000);
    }

    #[test]
    fn groups_by_scope() {
        let c = parse_counters(SAMPLE).unwrap();
        let users = by_scope(&c, Scope::User);
        assert_eq!(users.keys().collect::<Vec<_>>(), ["alice", "alice2", "bob"]);
        assert_eq!(users["bob"], Traffic { uplink: 5, downlink: 0 });

        let inbounds = by_scope(&c, Scope::Inbound);
        assert_eq!(inbounds["ss-in"].total(), 4005);
        assert!(by_scope(&c, Scope::Outbound).is_empty());
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024 * 1024), "2.00 TB");
    }

    #[tokio::test]
    async fn missing_engine_binary() {
        let client = StatsClient::new("/nonexistent/relayctl-test/xray", 10085);
        assert!(matches!(
            client.query(false).await,
            Err(EngineError::EngineMissing(_))
        ));
    }
}
