//! Applying transit changes to a line set.

use log::{debug, warn};
use serde_json::Value;

use crate::changes::{PropertyChange, TransitChange, TransitFacility};
use crate::cube::CubeTransit;
use crate::diff::properties::HEADWAY_SECS;
use crate::diff::shape::{find_run, nodes_from_value};
use crate::identifiers::LineName;
use crate::models::line::Line;
use crate::models::types::{number_value, value_as_f64, Result, RouteNode, TransitError};
use crate::naming::RouteName;
use crate::parameters::TransitParameters;

impl CubeTransit {
    /// Lines matching a facility: same route and direction, same agency when
    /// the facility names one, and the same overall time span.
    pub fn select_lines(&self, facility: &TransitFacility, params: &TransitParameters) -> Result<Vec<LineName>> {
        let span = facility.time_span()?;
        let selected = self
            .lines()
            .iter()
            .filter(|line| {
                let Ok(route) = RouteName::parse(line.name.as_str()) else {
                    return false;
                };
                route.route_id == facility.route_id
                    && route.direction_number() == Some(facility.direction_id)
                    && facility.agency_id.as_ref().map_or(true, |agency| *agency == route.agency_id)
                    && params.line_time_span(line).is_ok_and(|s| s == span)
            })
            .map(|line| line.name.clone())
            .collect();
        Ok(selected)
    }

    /// Apply one change, returning the names of the lines it touched.
    pub fn apply_change(&mut self, change: &TransitChange, params: &TransitParameters) -> Result<Vec<LineName>> {
        match change {
            TransitChange::Update(update) => {
                let names = self.select_nonempty(&update.facility, params)?;
                for name in &names {
                    let line = self
                        .line_mut(name.as_str())
                        .ok_or_else(|| TransitError::LineNotFound(name.clone()))?;
                    for property in &update.properties {
                        apply_property(line, property, &update.facility, params)?;
                    }
                    line.reorder_nodes();
                }
                Ok(names)
            }
            TransitChange::Delete(deletion) => {
                let names = self.select_nonempty(&deletion.facility, params)?;
                for name in &names {
                    debug!("Deleting line {name}");
                    self.remove_line(name.as_str());
                }
                Ok(names)
            }
            TransitChange::Add(addition) => {
                let line = new_line(&addition.facility, &addition.properties, params)?;
                let name = line.name.clone();
                debug!("Adding line {name}");
                self.add_line(line)?;
                Ok(vec![name])
            }
        }
    }

    pub fn apply_changes<'a>(
        &mut self,
        changes: impl IntoIterator<Item = &'a TransitChange>,
        params: &TransitParameters,
    ) -> Result<()> {
        for change in changes {
            self.apply_change(change, params)?;
        }
        Ok(())
    }

    fn select_nonempty(&self, facility: &TransitFacility, params: &TransitParameters) -> Result<Vec<LineName>> {
        let names = self.select_lines(facility, params)?;
        if names.is_empty() {
            return Err(TransitError::InvalidData(format!(
                "No line matches route {} direction {} from {} to {}",
                facility.route_id, facility.direction_id, facility.start_time, facility.end_time
            )));
        }
        Ok(names)
    }
}

/// Transit period numbers a facility covers on a line.
fn period_numbers(line: &Line, facility: &TransitFacility, params: &TransitParameters) -> Result<Vec<String>> {
    let numbers = line.time_period_numbers();
    if !numbers.is_empty() {
        return Ok(numbers);
    }
    let span = facility.time_span()?;
    let period = params
        .time_periods
        .period_for_span(&span)
        .ok_or_else(|| TransitError::UnknownTimePeriod(span.to_string()))?;
    Ok(vec![params.transit_period_number(period)?.to_string()])
}

fn apply_property(
    line: &mut Line,
    change: &PropertyChange,
    facility: &TransitFacility,
    params: &TransitParameters,
) -> Result<()> {
    match change.property.as_str() {
        HEADWAY_SECS => {
            for number in period_numbers(line, facility, params)? {
                let key = params
                    .properties_for_period(&number)
                    .into_iter()
                    .find(|key| line.properties.contains_key(key))
                    .unwrap_or_else(|| format!("HEADWAY[{number}]"));
                let current = line.properties.get(&key).and_then(value_as_f64).map(|m| m * 60.0);
                check_existing(line, &key, change, current.map(number_value).as_ref());

                match new_value(change, current) {
                    Some(Value::Null) => {
                        line.properties.shift_remove(&key);
                    }
                    Some(secs) => {
                        let minutes = value_as_f64(&secs)
                            .map(|s| number_value(s / 60.0))
                            .unwrap_or(secs);
                        line.properties.insert(key, minutes);
                    }
                    None => {}
                }
            }
        }
        "routing" => apply_routing(line, change)?,
        property => {
            let current = line.properties.get(property).cloned();
            check_existing(line, property, change, current.as_ref());
            match new_value(change, current.as_ref().and_then(value_as_f64)) {
                Some(Value::Null) => {
                    line.properties.shift_remove(property);
                }
                Some(value) => {
                    line.properties.insert(property.to_string(), value);
                }
                None => {}
            }
        }
    }
    Ok(())
}

/// `set` as given, or `change` added to the current numeric value.
fn new_value(change: &PropertyChange, current: Option<f64>) -> Option<Value> {
    if let Some(set) = &change.set {
        return Some(set.clone());
    }
    let delta = change.change.as_ref().and_then(value_as_f64)?;
    Some(number_value(current.unwrap_or(0.0) + delta))
}

fn check_existing(line: &Line, key: &str, change: &PropertyChange, current: Option<&Value>) {
    let Some(expected) = &change.existing else {
        return;
    };
    let matches = match (current, value_as_f64(expected)) {
        (Some(current), Some(expected)) => value_as_f64(current) == Some(expected),
        (Some(current), None) => current == expected,
        (None, _) => expected.is_null(),
    };
    if !matches {
        warn!(
            "Line {}: existing value of {key} is {:?}, card expects {expected}",
            line.name, current
        );
    }
}

fn apply_routing(line: &mut Line, change: &PropertyChange) -> Result<()> {
    let set = change
        .set
        .as_ref()
        .and_then(nodes_from_value)
        .ok_or_else(|| TransitError::InvalidData(format!("Line {}: routing change has no node list", line.name)))?;

    let Some(existing) = change.existing.as_ref() else {
        line.set_routing(&set);
        return Ok(());
    };
    let existing = nodes_from_value(existing)
        .ok_or_else(|| TransitError::InvalidData(format!("Line {}: invalid existing routing", line.name)))?;

    let current = line.signed_nodes();
    let Some(start) = find_run(&current, &existing) else {
        if find_run(&current, &set).is_some() {
            debug!("Line {}: routing change already applied", line.name);
            return Ok(());
        }
        return Err(TransitError::InvalidData(format!(
            "Line {}: existing routing {existing:?} not found",
            line.name
        )));
    };
    // `existing` can be a sub-run of `set`, so it still matches once applied.
    if covered_by_run(&current, &set, start, existing.len()) {
        debug!("Line {}: routing change already applied", line.name);
        return Ok(());
    }

    let replaced: Vec<RouteNode> = line.nodes.splice(start..start + existing.len(), []).collect();
    let inserted: Vec<RouteNode> = set
        .iter()
        .map(|&signed| {
            // Keep node keywords for nodes that survive the edit.
            let mut node = RouteNode::new(signed, 0);
            if let Some(old) = replaced.iter().find(|old| old.id == node.id) {
                node.attributes = old.attributes.clone();
            }
            node
        })
        .collect();
    line.nodes.splice(start..start, inserted);
    Ok(())
}

/// Whether some occurrence of `run` in `nodes` spans `start..start + len`.
fn covered_by_run(nodes: &[i64], run: &[i64], start: usize, len: usize) -> bool {
    if run.is_empty() || run.len() < len {
        return false;
    }
    nodes
        .windows(run.len())
        .enumerate()
        .any(|(i, window)| window == run && i <= start && start + len <= i + run.len())
}

/// Build a line for new service from its facility and properties.
fn new_line(facility: &TransitFacility, properties: &[PropertyChange], params: &TransitParameters) -> Result<Line> {
    let agency = facility.agency_id.clone().ok_or_else(|| {
        TransitError::InvalidData(format!("New service for route {} has no agency_id", facility.route_id))
    })?;
    let span = facility.time_span()?;
    let period = params
        .time_periods
        .period_for_span(&span)
        .ok_or_else(|| TransitError::UnknownTimePeriod(span.to_string()))?;
    let number = params.transit_period_number(period)?.to_string();
    let token = params.demand_abbreviation(period)?;
    let name = RouteName::new(facility.route_id.clone(), token, agency, facility.direction_id).line_name();

    let mut line = Line::new(name);
    for property in properties {
        let value = property.set.clone().unwrap_or(Value::Null);
        match property.property.as_str() {
            HEADWAY_SECS => {
                let minutes = value_as_f64(&value).map(|s| number_value(s / 60.0)).unwrap_or(value);
                line.properties.insert(format!("HEADWAY[{number}]"), minutes);
            }
            "routing" => {
                let nodes = nodes_from_value(&value).ok_or_else(|| {
                    TransitError::InvalidData(format!("Line {}: invalid routing", line.name))
                })?;
                line.set_routing(&nodes);
            }
            key => {
                line.properties.insert(key.to_string(), value);
            }
        }
    }
    Ok(line)
}
