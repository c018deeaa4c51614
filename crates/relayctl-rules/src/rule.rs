//! Rule targets and match values as entered on the command line.

use std::fmt;
use std::str::FromStr;

use relayctl_config::{MatchKind, Role};
use relayctl_core::{TAG_BLACKHOLE, TAG_DIRECT, TAG_UPSTREAM};

use crate::error::RulesError;

/// Where matched traffic goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Forward to the upstream relay (EDGE only).
    Upstream,
    /// Leave through this node's own egress.
    Direct,
    /// Drop.
    Blackhole,
}

impl Target {
    /// Outbound tag in the document.
    pub fn tag(self) -> &'static str {
        match self {
            Target::Upstream => TAG_UPSTREAM,
            Target::Direct => TAG_DIRECT,
            Target::Blackhole => TAG_BLACKHOLE,
        }
    }

    /// Fail with `InvalidOutbound` unless `role` has this outbound.
    pub fn check_role(self, role: Role) -> Result<(), RulesError> {
        if role.outbound_tags().contains(&self.tag()) {
            Ok(())
        } else {
            Err(invalid_outbound(self.tag(), role))
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Parse a target token. Unknown tokens are reported against `role` so the
/// message lists what is actually available.
pub fn parse_target(token: &str, role: Role) -> Result<Target, RulesError> {
    token
        .parse::<Target>()
        .map_err(|_| invalid_outbound(token.trim(), role))
}

impl FromStr for Target {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relay" | "upstream" | "proxy" => Ok(Target::Upstream),
            "direct" => Ok(Target::Direct),
            "blackhole" | "block" | "reject" => Ok(Target::Blackhole),
            _ => Err(()),
        }
    }
}

fn invalid_outbound(tag: &str, role: Role) -> RulesError {
    RulesError::InvalidOutbound {
        tag: tag.to_string(),
        role,
        allowed: role.outbound_tags().join(", "),
    }
}

/// Normalize user-entered match values.
///
/// Each raw argument may hold several comma-separated values. Values are
/// trimmed; an empty value anywhere is an error, as is an empty list.
pub fn normalize_values(kind: MatchKind, raw: &[String]) -> Result<Vec<String>, RulesError> {
    let mut out = Vec::new();
    for arg in raw {
        for v in arg.split(',') {
            let v = v.trim();
            if v.is_empty() {
                return Err(RulesError::InvalidInput(format!(
                    "empty {kind} value in '{arg}'"
                )));
            }
            if v.chars().any(char::is_whitespace) {
                return Err(RulesError::InvalidInput(format!(
                    "{kind} value '{v}' contains whitespace"
                )));
            }
            out.push(v.to_string());
        }
    }
    if out.is_empty() {
        return Err(RulesError::InvalidInput(format!(
            "at least one {kind} value is required"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_aliases() {
        assert_eq!("DIRECT".parse::<Target>(), Ok(Target::Direct));
        assert_eq!("block".parse::<Target>(), Ok(Target::Blackhole));
        assert_eq!("relay".parse::<Target>(), Ok(Target::Upstream));
        assert!("tor".parse::<Target>().is_err());
    }

    #[test]
    fn gateway_has_no_upstream() {
        assert!(Target::Direct.check_role(Role::Gateway).is_ok());
        let err = Target::Upstream.check_role(Role::Gateway).unwrap_err();
        assert!(matches!(err, RulesError::InvalidOutbound { .. }));
        assert!(Target::Upstream.check_role(Role::Edge).is_ok());
    }

    #[test]
    fn unknown_token_lists_allowed() {
        let err = parse_target("tor", Role::Edge).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("relay, direct, blackhole"), "{msg}");
    }

    #[test]
    fn values_split_and_trim() {
        let raw = vec![" netflix.com , geosite:youtube".to_string(), "a.b".to_string()];
        assert_eq!(
            normalize_values(MatchKind::Domain, &raw).unwrap(),
            ["netflix.com", "geosite:youtube", "a.b"]
        );
    }

    #[test]
    fn empty_values_rejected() {
        for raw in [vec![], vec!["".to_string()], vec!["a.com,,b.com".to_string()]] {
            assert!(matches!(
                normalize_values(MatchKind::Ip, &raw),
                Err(RulesError::InvalidInput(_))
            ));
        }
    }
}
