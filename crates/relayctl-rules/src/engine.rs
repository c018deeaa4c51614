//! Custom routing rule operations.
//!
//! Only the custom region of the routing table is touched. Indices seen by
//! users are 1-based positions within that region, in insertion order; the
//! table itself keeps custom rules after the built-ins on GATEWAY nodes and
//! ahead of the catch-all on EDGE nodes.

use relayctl_config::{ConfigDocument, CustomRule, MatchKind};
use relayctl_core::ERROR_PRECONDITION;
use tracing::{debug, warn};

use crate::error::RulesError;
use crate::rule::{Target, normalize_values};

/// Custom rules in insertion order.
pub fn list(doc: &ConfigDocument) -> &[CustomRule] {
    doc.routing.custom()
}

/// Append a custom rule at the tail of the custom region and return its
/// 1-based position.
pub fn add(
    doc: &mut ConfigDocument,
    target: Target,
    kind: MatchKind,
    values: &[String],
) -> Result<usize, RulesError> {
    target.check_role(doc.role())?;
    let values = normalize_values(kind, values)?;

    doc.routing.push_custom(CustomRule {
        kind,
        values,
        outbound_tag: target.tag().to_string(),
        extra: Default::default(),
    });
    let position = doc.routing.custom().len();
    debug!(position, %kind, outbound = target.tag(), "custom rule added");
    Ok(position)
}

/// Delete the custom rule at 1-based `index`.
pub fn remove(doc: &mut ConfigDocument, index: i64) -> Result<CustomRule, RulesError> {
    let count = doc.routing.custom().len();
    if count == 0 {
        warn!(index, kind = ERROR_PRECONDITION, "no custom rules to remove");
        return Err(RulesError::NoCustomRules);
    }
    let zero_based = usize::try_from(index)
        .ok()
        .filter(|&i| (1..=count).contains(&i))
        .map(|i| i - 1)
        .ok_or(RulesError::InvalidIndex { index, count })?;
    let removed = doc
        .routing
        .remove_custom(zero_based)
        .ok_or(RulesError::InvalidIndex { index, count })?;
    debug!(index, remaining = count - 1, "custom rule removed");
    Ok(removed)
}
