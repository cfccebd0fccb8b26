//! Roadway differencing: consolidate change records against the base
//! network and express them as project-card changes.

use std::collections::HashMap;

use log::{debug, error, info, warn};
use serde_json::Value;

use crate::card::{AddNewRoadway, Change, RoadwayDeletion, RoadwayFacility, RoadwayPropertyChange, Selector};
use crate::changes::{ChangeRecord, ChangeTable, ObjectKind, Operation};
use crate::columns::column_name_to_parts;
use crate::error::{LassoError, Result};
use crate::parameters::Parameters;
use crate::roadway::time_varying::TimeVaryingValue;
use crate::roadway::{value_as_i64, values_equal, RoadwayNetwork};
use crate::transit::changes::{PropertyChange, TimeOfDayChange};
use crate::transit::models::types::{value_as_f64, value_to_string};

/// Relative change in `distance` below which it is not reported.
const DISTANCE_TOLERANCE: f64 = 0.01;

fn endpoints(record: &ChangeRecord) -> Option<(i64, i64)> {
    Some((value_as_i64(record.get("A")?)?, value_as_i64(record.get("B")?)?))
}

fn describe(record: &ChangeRecord, column: &str) -> String {
    record.get(column).map(value_to_string).unwrap_or_else(|| "?".to_string())
}

/// Check that every link and node a record changes exists in the base.
/// Deletions are not checked.
pub fn check_compatibility(base: &RoadwayNetwork, changes: &ChangeTable) -> Result<()> {
    info!("Evaluating compatibility between roadway network changes and base network");

    let missing_links: Vec<String> = changes
        .records_of(ObjectKind::Link)
        .filter(|record| record.operation == Operation::Change)
        .filter(|record| match endpoints(record) {
            Some((a, b)) => base.links_by_ab(a, b).is_empty(),
            None => true,
        })
        .map(|record| format!("({}, {})", describe(record, "A"), describe(record, "B")))
        .collect();
    if !missing_links.is_empty() {
        let message = format!("network missing the following AB links: {}", missing_links.join(", "));
        error!("{message}");
        return Err(LassoError::IncompatibleNetwork(message));
    }

    let missing_nodes: Vec<String> = changes
        .records_of(ObjectKind::Node)
        .filter(|record| record.operation == Operation::Change)
        .filter(|record| {
            record
                .get("model_node_id")
                .and_then(value_as_i64)
                .map_or(true, |id| base.node_index(id).is_none())
        })
        .map(|record| describe(record, "model_node_id"))
        .collect();
    if !missing_nodes.is_empty() {
        let message = format!("network missing the following nodes: {}", missing_nodes.join(", "));
        error!("{message}");
        return Err(LassoError::IncompatibleNetwork(message));
    }
    Ok(())
}

// ============================================================================
// Consolidation
// ============================================================================

/// What a sequence of edits to one link or node amounts to. `None` means
/// the element was added and then deleted again.
fn final_operation(history: &[Operation]) -> Option<Operation> {
    let (last, earlier) = history.split_last()?;
    let added = earlier.contains(&Operation::Add);
    match last {
        Operation::Delete if added => None,
        Operation::Delete => Some(Operation::Delete),
        Operation::Add if earlier.contains(&Operation::Delete) => Some(Operation::Change),
        Operation::Add => Some(Operation::Add),
        Operation::Change if added => Some(Operation::Add),
        Operation::Change => Some(Operation::Change),
    }
}

struct Consolidated<'a> {
    record: &'a ChangeRecord,
    operation: Option<Operation>,
}

/// Keep the last record per key, ordered by where that record appears.
fn consolidate<'a>(
    records: &[&'a ChangeRecord],
    key: impl Fn(&ChangeRecord) -> Option<String>,
) -> Result<Vec<Consolidated<'a>>> {
    let mut histories: HashMap<String, (Vec<Operation>, usize)> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        let key = key(record).ok_or_else(|| {
            LassoError::InvalidChanges(format!(
                "{} record has no key: {}",
                record.object,
                Value::Object(record.attributes.clone())
            ))
        })?;
        let entry = histories.entry(key).or_default();
        entry.0.push(record.operation);
        entry.1 = index;
    }

    let mut consolidated: Vec<(usize, Option<Operation>)> = histories
        .into_values()
        .map(|(history, last)| (last, final_operation(&history)))
        .collect();
    consolidated.sort_by_key(|(last, _)| *last);
    Ok(consolidated
        .into_iter()
        .map(|(last, operation)| Consolidated {
            record: records[last],
            operation,
        })
        .collect())
}

fn link_key(record: &ChangeRecord) -> Option<String> {
    endpoints(record).map(|(a, b)| format!("{a}-{b}"))
}

fn node_key(record: &ChangeRecord) -> Option<String> {
    record.get("model_node_id").map(|id| match value_as_i64(id) {
        Some(id) => id.to_string(),
        None => value_to_string(id),
    })
}

// ============================================================================
// Card changes
// ============================================================================

fn process_deletions(base: &RoadwayNetwork, links: &[Consolidated]) -> Result<Option<Change>> {
    let mut ids = Vec::new();
    for link in links.iter().filter(|l| l.operation == Some(Operation::Delete)) {
        let id = match link.record.get("model_link_id") {
            Some(id) => id.clone(),
            None => endpoints(link.record)
                .and_then(|(a, b)| base.links_by_ab(a, b).first().copied())
                .and_then(|index| base.links[index].get("model_link_id").cloned())
                .ok_or_else(|| {
                    LassoError::IncompatibleNetwork(format!(
                        "no link ({}, {}) to delete",
                        describe(link.record, "A"),
                        describe(link.record, "B")
                    ))
                })?,
        };
        ids.push(id);
    }

    if ids.is_empty() {
        debug!("No link deletions processed");
        return Ok(None);
    }
    debug!("{} links deleted", ids.len());
    let mut selector = Selector::new();
    selector.insert("model_link_id".to_string(), Value::Array(ids));
    Ok(Some(Change::RoadwayDeletion(RoadwayDeletion {
        links: Some(selector),
        nodes: None,
    })))
}

fn process_additions(
    links: &[Consolidated],
    nodes: &[Consolidated],
    limit_to: Option<&[String]>,
) -> Option<Change> {
    let added_links: Vec<_> = links
        .iter()
        .filter(|l| l.operation == Some(Operation::Add))
        .map(|l| match limit_to {
            Some(columns) => l
                .record
                .attributes
                .iter()
                .filter(|(column, _)| columns.contains(column))
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect(),
            None => l.record.attributes.clone(),
        })
        .collect();
    let added_nodes: Vec<_> = nodes
        .iter()
        .filter(|n| n.operation == Some(Operation::Add))
        .map(|n| n.record.attributes.clone())
        .collect();

    debug!("{} links and {} nodes added", added_links.len(), added_nodes.len());
    if added_links.is_empty() && added_nodes.is_empty() {
        return None;
    }
    Some(Change::AddNewRoadway(AddNewRoadway {
        links: added_links,
        nodes: added_nodes,
    }))
}

/// Plain view of a base value, using the default of a time-varying one.
fn base_value(value: Option<&Value>) -> Value {
    match value {
        Some(value) => TimeVaryingValue::from_value(value)
            .map(|varying| varying.default)
            .unwrap_or_else(|| value.clone()),
        None => Value::Null,
    }
}

fn is_changed(column: &str, value: &Value, base: &Value) -> bool {
    if values_equal(value, base) {
        return false;
    }
    if column == "roadway_class" && value_as_f64(value) == Some(0.0) {
        return false;
    }
    if column == "distance" {
        return match (value_as_f64(value), value_as_f64(base)) {
            (Some(new), Some(old)) => ((new - old) / old).abs() > DISTANCE_TOLERANCE,
            _ => true,
        };
    }
    true
}

/// Property changes for one changed link, with the base link's id.
fn process_link_change(
    base: &RoadwayNetwork,
    record: &ChangeRecord,
    changeable: &[String],
    params: &Parameters,
) -> Result<Option<(Value, Vec<PropertyChange>)>> {
    let Some((a, b)) = endpoints(record) else {
        return Err(LassoError::InvalidChanges("changed link without A and B".to_string()));
    };
    let matches = base.links_by_ab(a, b);
    let Some(&index) = matches.first() else {
        let message = format!("no match found in network for AB combination ({a},{b})");
        error!("{message}");
        return Err(LassoError::IncompatibleNetwork(message));
    };
    if matches.len() > 1 {
        warn!("Found more than one match in base network for AB combination ({a},{b}); using the first");
    }
    let base_link = &base.links[index];

    let mut properties: Vec<PropertyChange> = Vec::new();
    for column in changeable {
        let Some(value) = record.attributes.get(column) else {
            continue;
        };
        let existing = base_value(base_link.get(column));
        if !is_changed(column, value, &existing) {
            continue;
        }
        let existing = (!params.is_calculated(column)).then_some(existing);
        let parts = column_name_to_parts(column, params);

        let Some(period) = &parts.time_period else {
            match properties.iter_mut().find(|p| &p.property == column) {
                Some(property) => {
                    property.existing = existing;
                    property.set = Some(value.clone());
                }
                None => properties.push(PropertyChange {
                    property: column.clone(),
                    existing,
                    set: Some(value.clone()),
                    ..Default::default()
                }),
            }
            continue;
        };

        let entry = TimeOfDayChange {
            time: params.transit.time_periods.span(period)?,
            category: parts.category.clone(),
            existing,
            set: Some(value.clone()),
            change: None,
        };
        let name = parts.property_name();
        match properties.iter_mut().find(|p| p.property == name) {
            Some(property) => property.timeofday.get_or_insert_with(Vec::new).push(entry),
            None => properties.push(PropertyChange {
                property: name,
                timeofday: Some(vec![entry]),
                ..Default::default()
            }),
        }
    }

    if properties.is_empty() {
        return Ok(None);
    }
    let id = base_link.get("model_link_id").cloned().unwrap_or(Value::Null);
    Ok(Some((id, properties)))
}

fn process_link_changes(
    base: &RoadwayNetwork,
    links: &[Consolidated],
    changeable: &[String],
    params: &Parameters,
) -> Result<Vec<Change>> {
    // Links with identical edits share one change.
    let mut grouped: Vec<(String, Vec<PropertyChange>, Vec<Value>)> = Vec::new();
    for link in links.iter().filter(|l| l.operation == Some(Operation::Change)) {
        let Some((id, properties)) = process_link_change(base, link.record, changeable, params)? else {
            continue;
        };
        let key = serde_json::to_string(&properties).unwrap_or_default();
        match grouped.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, ids)) => ids.push(id),
            None => grouped.push((key, properties, vec![id])),
        }
    }

    if grouped.is_empty() {
        info!("No link changes processed");
    }
    debug!("{} property changes processed", grouped.len());
    Ok(grouped
        .into_iter()
        .map(|(_, properties, ids)| {
            Change::RoadwayProperty(RoadwayPropertyChange {
                facility: RoadwayFacility::for_links(ids),
                properties,
            })
        })
        .collect())
}

/// Express a change table as roadway card changes against `base`:
/// deletions first, then additions, then property changes.
///
/// `base` should already carry the model's split columns (`lanes_AM`, ...)
/// so that per-period columns in the changes have a base value.
pub fn evaluate_roadway_changes(
    base: &RoadwayNetwork,
    changes: &ChangeTable,
    params: &Parameters,
    limit_variables_to_existing_network: bool,
) -> Result<Vec<Change>> {
    if changes.is_empty() {
        return Ok(Vec::new());
    }
    let mut table = changes.clone();
    table.prepare(base, params);
    check_compatibility(base, &table)?;

    let link_records: Vec<&ChangeRecord> = table.records_of(ObjectKind::Link).collect();
    let node_records: Vec<&ChangeRecord> = table.records_of(ObjectKind::Node).collect();
    let links = consolidate(&link_records, link_key)?;
    let nodes = consolidate(&node_records, node_key)?;

    if nodes
        .iter()
        .any(|n| matches!(n.operation, Some(Operation::Change | Operation::Delete)))
    {
        let message = "NODE changes and deletions are not allowed!";
        error!("{message}");
        return Err(LassoError::InvalidChanges(message.to_string()));
    }

    let base_columns = base.link_columns();
    let change_columns = table.columns(ObjectKind::Link);
    let missing: Vec<&String> = change_columns
        .iter()
        .filter(|c| !base_columns.contains(c))
        .collect();
    if !missing.is_empty() {
        warn!("The following attributes are specified in the changes but do not exist in the base network: {missing:?}");
    }
    let changeable: Vec<String> = change_columns
        .iter()
        .filter(|c| base_columns.contains(c) && !params.is_static(c))
        .cloned()
        .collect();

    let mut result = Vec::new();
    result.extend(process_deletions(base, &links)?);
    result.extend(process_additions(
        &links,
        &nodes,
        limit_variables_to_existing_network.then_some(&base_columns[..]),
    ));
    result.extend(process_link_changes(base, &links, &changeable, params)?);
    info!("Evaluated {} roadway changes", result.len());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadway::tests::{link, node};
    use serde_json::json;

    fn record(value: Value) -> ChangeRecord {
        let Value::Object(attributes) = value else {
            panic!("expected an object");
        };
        ChangeRecord::from_attributes(attributes).unwrap()
    }

    fn base() -> RoadwayNetwork {
        RoadwayNetwork::new(
            vec![
                link(1, 1, 2, json!({"lanes": 2, "lanes_AM": 2, "distance": 1.0, "name": "Main St", "county": "Ramsey"})),
                link(2, 2, 3, json!({"lanes": 2, "lanes_AM": 2, "distance": 1.0, "name": "Main St", "county": "Ramsey"})),
                link(3, 3, 4, json!({"lanes": 1, "lanes_AM": 1, "distance": 2.0, "name": "Elm St", "county": "Ramsey"})),
            ],
            vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0), node(3, 2.0, 0.0), node(4, 3.0, 0.0)],
        )
    }

    #[test]
    fn test_final_operation() {
        use Operation::*;
        assert_eq!(final_operation(&[Add, Delete]), None);
        assert_eq!(final_operation(&[Delete]), Some(Delete));
        assert_eq!(final_operation(&[Delete, Add]), Some(Change));
        assert_eq!(final_operation(&[Add]), Some(Add));
        assert_eq!(final_operation(&[Add, Change]), Some(Add));
        assert_eq!(final_operation(&[Change, Change]), Some(Change));
    }

    #[test]
    fn test_empty_changes_yield_nothing() {
        let changes = evaluate_roadway_changes(&base(), &ChangeTable::default(), &Parameters::default(), false);
        assert!(changes.unwrap().is_empty());
    }

    #[test]
    fn test_identical_edits_are_grouped() {
        let table = ChangeTable::new(vec![
            record(json!({"A": 1, "B": 2, "lanes": 3, "distance": 1.005, "county": "Hennepin"})),
            record(json!({"A": 2, "B": 3, "lanes": 3, "distance": 1.0})),
            record(json!({"A": 3, "B": 4, "lanes": 1, "name": "Elm Street"})),
        ]);
        let changes = evaluate_roadway_changes(&base(), &table, &Parameters::default(), false).unwrap();
        assert_eq!(changes.len(), 2);

        let Change::RoadwayProperty(first) = &changes[0] else {
            panic!("expected a property change");
        };
        assert_eq!(first.facility.link[0]["model_link_id"], json!([1, 2]));
        assert_eq!(first.properties, vec![PropertyChange::set("lanes", 3).with_existing(2)]);

        let Change::RoadwayProperty(second) = &changes[1] else {
            panic!("expected a property change");
        };
        assert_eq!(second.properties, vec![PropertyChange::set("name", "Elm Street").with_existing("Elm St")]);
    }

    #[test]
    fn test_time_period_columns_become_timeofday() {
        let table = ChangeTable::new(vec![record(json!({"A": 1, "B": 2, "lanes_AM": 1}))]);
        let changes = evaluate_roadway_changes(&base(), &table, &Parameters::default(), false).unwrap();
        let Change::RoadwayProperty(change) = &changes[0] else {
            panic!("expected a property change");
        };
        let property = &change.properties[0];
        assert_eq!(property.property, "lanes");
        let timeofday = property.timeofday.as_ref().unwrap();
        assert_eq!(timeofday[0].time.to_strings(), ["06:00".to_string(), "09:00".to_string()]);
        assert_eq!(timeofday[0].existing, Some(json!(2)));
        assert_eq!(timeofday[0].set, Some(json!(1)));
    }

    #[test]
    fn test_delete_add_and_node_rules() {
        let table = ChangeTable::new(vec![
            record(json!({"OPERATION": "D", "A": 3, "B": 4})),
            record(json!({"OPERATION": "A", "A": 4, "B": 5, "lanes": 1})),
            record(json!({"OPERATION": "A", "A": 5, "B": 4, "lanes": 1})),
            record(json!({"OPERATION": "D", "A": 5, "B": 4})),
            record(json!({"OBJECT": "N", "OPERATION": "A", "N": 5, "X": 4.0, "Y": 0.0})),
        ]);
        let changes = evaluate_roadway_changes(&base(), &table, &Parameters::default(), false).unwrap();
        assert_eq!(changes.len(), 2);
        let Change::RoadwayDeletion(deletion) = &changes[0] else {
            panic!("expected a deletion");
        };
        assert_eq!(deletion.links.as_ref().unwrap()["model_link_id"], json!([3]));
        let Change::AddNewRoadway(addition) = &changes[1] else {
            panic!("expected an addition");
        };
        assert_eq!(addition.links.len(), 1);
        assert_eq!(addition.nodes[0]["model_node_id"], json!(5));

        let node_change = ChangeTable::new(vec![record(json!({"OBJECT": "N", "OPERATION": "D", "N": 4}))]);
        let err = evaluate_roadway_changes(&base(), &node_change, &Parameters::default(), false).unwrap_err();
        assert!(err.to_string().contains("NODE changes and deletions are not allowed!"));
    }

    #[test]
    fn test_missing_link_is_incompatible() {
        let table = ChangeTable::new(vec![record(json!({"A": 9, "B": 8, "lanes": 3}))]);
        let err = check_compatibility(&base(), &table).unwrap_err();
        assert!(matches!(err, LassoError::IncompatibleNetwork(_)));
        assert!(err.to_string().contains("(9, 8)"));
    }
}
