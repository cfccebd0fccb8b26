//! Routing (node sequence) differences.
//!
//! The changed stretch is found by trimming the common prefix and suffix of
//! the two signed node lists, then widened by a buffer of nodes on each side
//! so the edit can be located again when it is applied.

use serde_json::Value;

use crate::changes::PropertyChange;

/// Unchanged nodes kept on each side of a routing edit.
pub const ROUTING_BUFFER: usize = 2;

/// `(existing, set)` slices describing how `base` becomes `build`.
pub fn diff_routing(base: &[i64], build: &[i64], buffer: usize) -> Option<(Vec<i64>, Vec<i64>)> {
    if base == build {
        return None;
    }

    let prefix = base.iter().zip(build).take_while(|(a, b)| a == b).count();
    let max_suffix = base.len().min(build.len()) - prefix;
    let suffix = base
        .iter()
        .rev()
        .zip(build.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(max_suffix);

    let start = prefix.saturating_sub(buffer);
    let base_end = (base.len() - suffix + buffer).min(base.len());
    let build_end = (build.len() - suffix + buffer).min(build.len());

    Some((base[start..base_end].to_vec(), build[start..build_end].to_vec()))
}

/// A `routing` property change, or `None` when the routings match.
pub fn routing_change(base: &[i64], build: &[i64]) -> Option<PropertyChange> {
    let (existing, set) = diff_routing(base, build, ROUTING_BUFFER)?;
    Some(PropertyChange {
        property: "routing".to_string(),
        existing: Some(nodes_value(&existing)),
        set: Some(nodes_value(&set)),
        ..Default::default()
    })
}

pub fn nodes_value(nodes: &[i64]) -> Value {
    Value::Array(nodes.iter().map(|n| Value::from(*n)).collect())
}

/// Signed node list from a card value; entries may be numbers or strings.
pub fn nodes_from_value(value: &Value) -> Option<Vec<i64>> {
    value
        .as_array()?
        .iter()
        .map(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect()
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find_run(haystack: &[i64], needle: &[i64]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
