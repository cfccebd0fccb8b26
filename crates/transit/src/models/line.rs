//! A transit line as read from a Cube line file.

use serde_json::{Map, Value};

use crate::identifiers::LineName;
use crate::models::types::RouteNode;

/// One `LINE` block: its name, its attributes and its routing.
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    pub name: LineName,
    /// Upper-case attribute name to value, in file order, excluding `NAME`.
    /// Time-dependent attributes are keyed `HEADWAY[1]`, `USERA[2]`, ...
    pub properties: Map<String, Value>,
    pub nodes: Vec<RouteNode>,
}

impl Line {
    pub fn new(name: impl Into<LineName>) -> Self {
        Self {
            name: name.into(),
            properties: Map::new(),
            nodes: Vec::new(),
        }
    }

    /// Build a line from signed node numbers (negative = non-stop).
    pub fn with_routing(mut self, signed_nodes: &[i64]) -> Self {
        self.set_routing(signed_nodes);
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_ascii_uppercase(), value.into());
        self
    }

    pub fn set_routing(&mut self, signed_nodes: &[i64]) {
        self.nodes = signed_nodes
            .iter()
            .enumerate()
            .map(|(i, n)| RouteNode::new(*n, i + 1))
            .collect();
    }

    /// Routing tokens: `"N"` for stops, `"-N"` for pass-through nodes.
    pub fn routing_tokens(&self) -> Vec<String> {
        self.nodes.iter().map(RouteNode::token).collect()
    }

    pub fn signed_nodes(&self) -> Vec<i64> {
        self.nodes.iter().map(RouteNode::signed_id).collect()
    }

    /// Distinct time period numbers found in `[n]` attributes, in file order.
    pub fn time_period_numbers(&self) -> Vec<String> {
        let mut numbers: Vec<String> = Vec::new();
        for key in self.properties.keys() {
            if let Some(n) = time_period_of_key(key) {
                if !numbers.iter().any(|existing| existing == n) {
                    numbers.push(n.to_string());
                }
            }
        }
        numbers
    }

    /// Renumber node `order` after an edit to the routing.
    pub fn reorder_nodes(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.order = i + 1;
        }
    }
}

/// `"HEADWAY[1]"` -> `Some("1")`
pub fn time_period_of_key(key: &str) -> Option<&str> {
    let open = key.find('[')?;
    let close = key[open..].find(']')? + open;
    let inner = &key[open + 1..close];
    (!inner.is_empty()).then_some(inner)
}

/// `"HEADWAY[1]"` -> `"HEADWAY"`
pub fn base_of_key(key: &str) -> &str {
    key.split('[').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_period_numbers() {
        let line = Line::new("0_452-111_452_pk1")
            .with_property("HEADWAY[1]", 10)
            .with_property("MODE", 5)
            .with_property("FREQ[2]", 20)
            .with_property("HEADWAY[2]", 20);

        assert_eq!(line.time_period_numbers(), vec!["1", "2"]);
    }

    #[test]
    fn test_routing_tokens() {
        let line = Line::new("0_452-111_452_pk1").with_routing(&[39249, -39240, 54648]);
        assert_eq!(line.routing_tokens(), vec!["39249", "-39240", "54648"]);
        assert_eq!(line.nodes[2].order, 3);
    }

    #[test]
    fn test_key_parts() {
        assert_eq!(time_period_of_key("USERA[3]"), Some("3"));
        assert_eq!(time_period_of_key("MODE"), None);
        assert_eq!(base_of_key("HEADWAY[1]"), "HEADWAY");
    }
}
