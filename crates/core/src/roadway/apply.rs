//! Applying roadway changes from project cards.

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::card::{AddNewRoadway, Change, RoadwayDeletion, RoadwayPropertyChange};
use crate::error::{LassoError, Result};
use crate::roadway::time_varying::TimeVaryingValue;
use crate::roadway::{values_equal, Link, Node, RoadwayNetwork};
use crate::transit::changes::PropertyChange;
use crate::transit::models::types::{number_value, value_as_f64};

/// An attribute written by a change: `(entity, property)`.
pub type Touched = (String, String);

impl RoadwayNetwork {
    /// Apply a roadway change. Transit changes are ignored here.
    ///
    /// Returns the link attributes the change set.
    pub fn apply_change(&mut self, change: &Change) -> Result<Vec<Touched>> {
        match change {
            Change::RoadwayProperty(change) => self.apply_property_change(change),
            Change::RoadwayDeletion(deletion) => self.apply_deletion(deletion).map(|_| Vec::new()),
            Change::AddNewRoadway(addition) => self.apply_addition(addition).map(|_| Vec::new()),
            _ => Ok(Vec::new()),
        }
    }

    fn apply_property_change(&mut self, change: &RoadwayPropertyChange) -> Result<Vec<Touched>> {
        let selected = self.select(&change.facility);
        if selected.is_empty() {
            return Err(LassoError::Network(format!(
                "no links match facility {}",
                serde_json::to_string(&change.facility).unwrap_or_default()
            )));
        }

        let mut touched = Vec::new();
        for index in selected {
            let link = &mut self.links[index];
            let label = link.label();
            for property in &change.properties {
                apply_link_property(link, &label, property);
                touched.push((format!("link {label}"), property.property.clone()));
            }
        }
        Ok(touched)
    }

    fn apply_deletion(&mut self, deletion: &RoadwayDeletion) -> Result<()> {
        let links = match &deletion.links {
            Some(selector) => {
                let facility = crate::card::RoadwayFacility {
                    link: vec![selector.clone()],
                    ..Default::default()
                };
                let selected = self.select(&facility);
                if selected.is_empty() {
                    return Err(LassoError::Network(format!(
                        "no links to delete match {}",
                        Value::Object(selector.clone())
                    )));
                }
                selected
            }
            None => Vec::new(),
        };
        let nodes = match &deletion.nodes {
            Some(selector) => {
                let selected = self.select_nodes(selector);
                if selected.is_empty() {
                    return Err(LassoError::Network(format!(
                        "no nodes to delete match {}",
                        Value::Object(selector.clone())
                    )));
                }
                selected
            }
            None => Vec::new(),
        };

        retain_unselected(&mut self.links, &links);
        retain_unselected(&mut self.nodes, &nodes);
        debug!("Deleted {} links and {} nodes", links.len(), nodes.len());
        Ok(())
    }

    /// All added nodes and links are checked before any is inserted.
    fn apply_addition(&mut self, addition: &AddNewRoadway) -> Result<()> {
        let mut nodes: Vec<Node> = Vec::with_capacity(addition.nodes.len());
        for properties in &addition.nodes {
            let node = Node::from_properties(properties.clone());
            let id = node
                .model_node_id()
                .ok_or_else(|| LassoError::Network("added node has no model_node_id".to_string()))?;
            if node.point.is_none() {
                return Err(LassoError::Network(format!("added node {id} needs X and Y")));
            }
            if self.node_index(id).is_some() || nodes.iter().any(|n| n.model_node_id() == Some(id)) {
                return Err(LassoError::Network(format!("node {id} already exists")));
            }
            nodes.push(node);
        }

        let mut links: Vec<Link> = Vec::with_capacity(addition.links.len());
        for properties in &addition.links {
            let link = Link::new(properties.clone());
            let (Some(a), Some(b)) = (link.a(), link.b()) else {
                return Err(LassoError::Network(format!("added link {} needs A and B", link.label())));
            };
            if let Some(id) = link.model_link_id() {
                if self.link_index(id).is_some() || links.iter().any(|l| l.model_link_id() == Some(id)) {
                    return Err(LassoError::Network(format!("link {id} already exists")));
                }
            }
            for node in [a, b] {
                let added = nodes.iter().any(|n| n.model_node_id() == Some(node));
                if !added && self.node_index(node).is_none() {
                    warn!("Added link {} references node {node} missing from the network", link.label());
                }
            }
            links.push(link);
        }

        debug!("Added {} links and {} nodes", links.len(), nodes.len());
        self.nodes.extend(nodes);
        self.links.extend(links);
        Ok(())
    }
}

fn retain_unselected<T>(items: &mut Vec<T>, selected: &[usize]) {
    let mut index = 0;
    items.retain(|_| {
        let keep = !selected.contains(&index);
        index += 1;
        keep
    });
}

/// `set` as given, or `change` added to the current numeric value.
fn resolve(set: Option<&Value>, change: Option<&Value>, current: Option<&Value>) -> Option<Value> {
    if let Some(set) = set {
        return Some(set.clone());
    }
    let delta = change.and_then(value_as_f64)?;
    let base = current.and_then(value_as_f64).unwrap_or(0.0);
    Some(number_value(base + delta))
}

fn check_existing(label: &str, property: &str, expected: Option<&Value>, current: Option<&Value>) {
    let Some(expected) = expected else {
        return;
    };
    let matches = match current {
        Some(current) => values_equal(current, expected),
        None => expected.is_null(),
    };
    if !matches {
        warn!("Link {label}: existing {property} is {current:?}, card expects {expected}");
    }
}

fn apply_link_property(link: &mut Link, label: &str, change: &PropertyChange) {
    let properties: &mut Map<String, Value> = &mut link.properties;
    let current = properties.get(&change.property).cloned();

    let Some(timeofday) = &change.timeofday else {
        let current_plain = current.as_ref().filter(|v| TimeVaryingValue::from_value(v).is_none());
        check_existing(label, &change.property, change.existing.as_ref(), current_plain);
        match resolve(change.set.as_ref(), change.change.as_ref(), current_plain) {
            Some(Value::Null) => {
                properties.shift_remove(&change.property);
            }
            Some(value) => {
                properties.insert(change.property.clone(), value);
            }
            None => {}
        }
        return;
    };

    let mut varying = current
        .as_ref()
        .and_then(TimeVaryingValue::from_value)
        .unwrap_or_else(|| TimeVaryingValue::from_default(current.clone().unwrap_or(Value::Null)));

    if let Some(default) = resolve(change.set.as_ref(), change.change.as_ref(), Some(&varying.default)) {
        varying.default = default;
    }
    for entry in timeofday {
        let existing = varying
            .get(&entry.time, entry.category.as_deref())
            .cloned()
            .unwrap_or_else(|| varying.default.clone());
        check_existing(label, &change.property, entry.existing.as_ref(), Some(&existing));
        if let Some(value) = resolve(entry.set.as_ref(), entry.change.as_ref(), Some(&existing)) {
            varying.set(entry.time, entry.category.clone(), value);
        }
    }
    properties.insert(change.property.clone(), varying.to_value());
}
