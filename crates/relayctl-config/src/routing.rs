//! Routing table model.
//!
//! The engine evaluates rules top to bottom and the first match wins, so the
//! position of built-in rules is load-bearing. The table stores each region
//! separately; the flat order is only ever derived:
//!
//! ```text
//! GATEWAY: control, private-block, custom...
//! EDGE:    control, custom..., catch-all
//! ```

use std::fmt;
use std::str::FromStr;

use relayctl_core::defaults::{TAG_BLACKHOLE, TAG_CONTROL, TAG_UPSTREAM};
use serde_json::{Map, Value};

use crate::document::Role;
use crate::loader::ConfigError;

/// Destination selector for the private-network block rule.
pub const PRIVATE_IP_SELECTOR: &str = "geoip:private";

/// What a custom rule matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Domain patterns (`example.com`, `domain:`, `geosite:`, `regexp:` ...).
    Domain,
    /// IP / CIDR / `geoip:` selectors.
    Ip,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Domain => "domain",
            MatchKind::Ip => "ip",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domain" => Ok(MatchKind::Domain),
            "ip" => Ok(MatchKind::Ip),
            other => Err(ConfigError::InvalidInput(format!(
                "unknown match kind '{other}' (expected domain or ip)"
            ))),
        }
    }
}

/// Routes the control listener to the stats API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRule {
    pub inbound_tag: String,
    pub outbound_tag: String,
}

impl Default for ControlRule {
    fn default() -> Self {
        Self {
            inbound_tag: TAG_CONTROL.to_string(),
            outbound_tag: TAG_CONTROL.to_string(),
        }
    }
}

/// Drops traffic to private destinations (GATEWAY only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateBlockRule {
    pub ips: Vec<String>,
    pub outbound_tag: String,
}

impl Default for PrivateBlockRule {
    fn default() -> Self {
        Self {
            ips: vec![PRIVATE_IP_SELECTOR.to_string()],
            outbound_tag: TAG_BLACKHOLE.to_string(),
        }
    }
}

/// Sends all client-listener traffic to the upstream relay (EDGE only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchAllRule {
    pub inbound_tags: Vec<String>,
    pub outbound_tag: String,
}

impl CatchAllRule {
    pub fn to_upstream(inbound_tags: Vec<String>) -> Self {
        Self {
            inbound_tags,
            outbound_tag: TAG_UPSTREAM.to_string(),
        }
    }
}

/// A user-added rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomRule {
    pub kind: MatchKind,
    pub values: Vec<String>,
    pub outbound_tag: String,
    /// Further engine predicates (`port`, `network`, `source`, ...) found on
    /// disk. They narrow the match and are written back unchanged.
    pub extra: Map<String, Value>,
}

/// One entry of the flattened rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    BuiltinControl(ControlRule),
    BuiltinPrivateBlock(PrivateBlockRule),
    BuiltinCatchAll(CatchAllRule),
    Custom(CustomRule),
}

impl Rule {
    pub fn is_custom(&self) -> bool {
        matches!(self, Rule::Custom(_))
    }

    pub fn outbound_tag(&self) -> &str {
        match self {
            Rule::BuiltinControl(r) => &r.outbound_tag,
            Rule::BuiltinPrivateBlock(r) => &r.outbound_tag,
            Rule::BuiltinCatchAll(r) => &r.outbound_tag,
            Rule::Custom(r) => &r.outbound_tag,
        }
    }

    /// Provenance label persisted alongside the rule.
    pub fn provenance(&self) -> &'static str {
        match self {
            Rule::BuiltinControl(_) => "control",
            Rule::BuiltinPrivateBlock(_) => "private-block",
            Rule::BuiltinCatchAll(_) => "catch-all",
            Rule::Custom(_) => "custom",
        }
    }
}

/// Ordered routing rules of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    control: ControlRule,
    private_block: Option<PrivateBlockRule>,
    custom: Vec<CustomRule>,
    catch_all: Option<CatchAllRule>,
}

impl RoutingTable {
    /// Built-in GATEWAY rules: control, then private-block. No catch-all;
    /// unmatched traffic falls through to the first outbound.
    pub fn gateway() -> Self {
        Self {
            control: ControlRule::default(),
            private_block: Some(PrivateBlockRule::default()),
            custom: Vec::new(),
            catch_all: None,
        }
    }

    /// Built-in EDGE rules: control first, catch-all last.
    pub fn edge(catch_all: CatchAllRule) -> Self {
        Self {
            control: ControlRule::default(),
            private_block: None,
            custom: Vec::new(),
            catch_all: Some(catch_all),
        }
    }

    /// Rebuild a table from a flat list, checking built-in placement for `role`.
    pub fn from_rules(role: Role, rules: Vec<Rule>) -> Result<Self, ConfigError> {
        let misplaced = |i: usize, r: &Rule| {
            ConfigError::Validation(format!(
                "routing.rules[{i}]: built-in {} rule out of place",
                r.provenance()
            ))
        };

        let mut iter = rules.into_iter().enumerate().peekable();
        let control = match iter.next() {
            Some((_, Rule::BuiltinControl(r))) => r,
            _ => {
                return Err(ConfigError::Validation(
                    "routing.rules[0] must be the control rule".into(),
                ));
            }
        };

        let mut table = match role {
            Role::Gateway => {
                let private_block = match iter.next() {
                    Some((_, Rule::BuiltinPrivateBlock(r))) => r,
                    _ => {
                        return Err(ConfigError::Validation(
                            "routing.rules[1] must be the private-block rule".into(),
                        ));
                    }
                };
                Self {
                    control,
                    private_block: Some(private_block),
                    custom: Vec::new(),
                    catch_all: None,
                }
            }
            Role::Edge => Self {
                control,
                private_block: None,
                custom: Vec::new(),
                catch_all: None,
            },
        };

        while let Some((i, rule)) = iter.next() {
            match rule {
                Rule::Custom(r) => table.custom.push(r),
                Rule::BuiltinCatchAll(r) if role == Role::Edge && iter.peek().is_none() => {
                    table.catch_all = Some(r);
                }
                other => return Err(misplaced(i, &other)),
            }
        }

        if role == Role::Edge && table.catch_all.is_none() {
            return Err(ConfigError::Validation(
                "routing.rules: edge documents must end with the catch-all rule".into(),
            ));
        }
        Ok(table)
    }

    pub fn control(&self) -> &ControlRule {
        &self.control
    }

    pub fn private_block(&self) -> Option<&PrivateBlockRule> {
        self.private_block.as_ref()
    }

    pub fn catch_all(&self) -> Option<&CatchAllRule> {
        self.catch_all.as_ref()
    }

    /// Custom rules in insertion order.
    pub fn custom(&self) -> &[CustomRule] {
        &self.custom
    }

    /// Append at the tail of the custom region. For EDGE tables this is
    /// immediately before the catch-all.
    pub fn push_custom(&mut self, rule: CustomRule) {
        self.custom.push(rule);
    }

    /// Remove the custom rule at zero-based `index`.
    pub fn remove_custom(&mut self, index: usize) -> Option<CustomRule> {
        (index < self.custom.len()).then(|| self.custom.remove(index))
    }

    /// Number of rules in evaluation order.
    pub fn len(&self) -> usize {
        1 + usize::from(self.private_block.is_some())
            + self.custom.len()
            + usize::from(self.catch_all.is_some())
    }

    /// Always false: every table holds at least the control rule.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Flattened rules in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        let mut out = Vec::with_capacity(self.len());
        out.push(Rule::BuiltinControl(self.control.clone()));
        if let Some(ref r) = self.private_block {
            out.push(Rule::BuiltinPrivateBlock(r.clone()));
        }
        out.extend(self.custom.iter().cloned().map(Rule::Custom));
        if let Some(ref r) = self.catch_all {
            out.push(Rule::BuiltinCatchAll(r.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(tag: &str, v: &str) -> CustomRule {
        CustomRule {
            kind: MatchKind::Domain,
            values: vec![v.to_string()],
            outbound_tag: tag.to_string(),
            extra: Default::default(),
        }
    }

    fn edge_table() -> RoutingTable {
        RoutingTable::edge(CatchAllRule::to_upstream(vec!["ss-in".into()]))
    }

    #[test]
    fn gateway_layout() {
        let mut t = RoutingTable::gateway();
        t.push_custom(custom("direct", "a.com"));
        let rules = t.rules();
        assert_eq!(rules.len(), 3);
        assert!(matches!(rules[0], Rule::BuiltinControl(_)));
        assert!(matches!(rules[1], Rule::BuiltinPrivateBlock(_)));
        assert!(rules[2].is_custom());
    }

    #[test]
    fn edge_custom_goes_before_catch_all() {
        let mut t = edge_table();
        t.push_custom(custom("direct", "a.com"));
        t.push_custom(custom("blackhole", "b.com"));
        let rules = t.rules();
        assert_eq!(rules.len(), 4);
        assert!(matches!(rules[0], Rule::BuiltinControl(_)));
        assert_eq!(rules[1], Rule::Custom(custom("direct", "a.com")));
        assert_eq!(rules[2], Rule::Custom(custom("blackhole", "b.com")));
        assert!(matches!(rules[3], Rule::BuiltinCatchAll(_)));
    }

    #[test]
    fn from_rules_round_trips() {
        let mut t = edge_table();
        t.push_custom(custom("direct", "a.com"));
        let rebuilt = RoutingTable::from_rules(Role::Edge, t.rules()).unwrap();
        assert_eq!(rebuilt, t);

        let mut g = RoutingTable::gateway();
        g.push_custom(custom("blackhole", "ads.com"));
        let rebuilt = RoutingTable::from_rules(Role::Gateway, g.rules()).unwrap();
        assert_eq!(rebuilt, g);
    }

    #[test]
    fn from_rules_rejects_custom_after_catch_all() {
        let t = edge_table();
        let mut rules = t.rules();
        rules.push(Rule::Custom(custom("direct", "late.com")));
        assert!(matches!(
            RoutingTable::from_rules(Role::Edge, rules),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn from_rules_requires_control_first() {
        let rules = vec![Rule::Custom(custom("direct", "a.com"))];
        assert!(RoutingTable::from_rules(Role::Gateway, rules).is_err());
    }

    #[test]
    fn from_rules_rejects_catch_all_on_gateway() {
        let mut rules = RoutingTable::gateway().rules();
        rules.push(Rule::BuiltinCatchAll(CatchAllRule::to_upstream(vec![])));
        assert!(RoutingTable::from_rules(Role::Gateway, rules).is_err());
    }

    #[test]
    fn remove_custom_out_of_range() {
        let mut t = RoutingTable::gateway();
        assert!(t.remove_custom(0).is_none());
        t.push_custom(custom("direct", "a.com"));
        assert!(t.remove_custom(1).is_none());
        assert!(t.remove_custom(0).is_some());
        assert!(t.custom().is_empty());
    }

    #[test]
    fn match_kind_parse() {
        assert_eq!("Domain".parse::<MatchKind>().unwrap(), MatchKind::Domain);
        assert_eq!("ip".parse::<MatchKind>().unwrap(), MatchKind::Ip);
        assert!("geo".parse::<MatchKind>().is_err());
    }
}
