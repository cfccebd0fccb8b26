//! Roadway edits recorded outside the network: Cube log files, CSV tables
//! and GeoJSON feature collections, all read into a [`ChangeTable`].

pub mod logfile;
pub mod roadway;
pub mod table;

use std::collections::BTreeMap;

use log::debug;
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{LassoError, Result};
use crate::parameters::Parameters;
use crate::roadway::RoadwayNetwork;
use crate::transit::models::types::{number_value, value_as_f64, value_to_string};

pub use logfile::{project_name_from_logfiles, read_logfile, read_logfiles};
pub use roadway::{check_compatibility, evaluate_roadway_changes};
pub use table::{read_csv_changes, read_geojson_changes};

pub const OBJECT_COLUMN: &str = "OBJECT";
pub const OPERATION_COLUMN: &str = "OPERATION";
pub const GROUP_COLUMN: &str = "GROUP";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum ObjectKind {
    #[strum(serialize = "L")]
    Link,
    #[strum(serialize = "N")]
    Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum Operation {
    #[strum(serialize = "A")]
    Add,
    #[strum(serialize = "C")]
    Change,
    #[strum(serialize = "D")]
    Delete,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChangeRecord {
    pub object: ObjectKind,
    pub operation: Operation,
    pub group: Option<String>,
    pub attributes: Map<String, Value>,
}

impl ChangeRecord {
    /// Split `OBJECT`, `OPERATION` and `GROUP` out of a row; the first two
    /// default to `L` and `C`.
    pub fn from_attributes(mut attributes: Map<String, Value>) -> Result<Self> {
        let object = match attributes.shift_remove(OBJECT_COLUMN) {
            Some(value) if !value.is_null() => {
                let text = value_to_string(&value);
                text.trim()
                    .parse::<ObjectKind>()
                    .map_err(|_| LassoError::InvalidChanges(format!("unknown OBJECT '{text}'")))?
            }
            _ => ObjectKind::Link,
        };
        let operation = match attributes.shift_remove(OPERATION_COLUMN) {
            Some(value) if !value.is_null() => {
                let text = value_to_string(&value);
                text.trim()
                    .parse::<Operation>()
                    .map_err(|_| LassoError::InvalidChanges(format!("unknown OPERATION '{text}'")))?
            }
            _ => Operation::Change,
        };
        let group = attributes
            .shift_remove(GROUP_COLUMN)
            .filter(|value| !value.is_null())
            .map(|value| value_to_string(&value));

        Ok(Self {
            object,
            operation,
            group,
            attributes,
        })
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column).filter(|value| !value.is_null())
    }
}

/// How a network column's values are typed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColumnKind {
    Number,
    Text,
}

fn column_kind<'a>(values: impl Iterator<Item = Option<&'a Value>>) -> Option<ColumnKind> {
    values.flatten().find_map(|value| match value {
        Value::Number(_) => Some(ColumnKind::Number),
        Value::String(_) => Some(ColumnKind::Text),
        _ => None,
    })
}

fn coerce(value: &Value, kind: ColumnKind) -> Value {
    match (kind, value) {
        (ColumnKind::Number, Value::String(text)) if text.trim().is_empty() => Value::Null,
        (ColumnKind::Number, Value::String(_)) => {
            value_as_f64(value).map_or_else(|| value.clone(), number_value)
        }
        (ColumnKind::Text, Value::Number(_)) => Value::String(value_to_string(value)),
        _ => value.clone(),
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeTable {
    pub records: Vec<ChangeRecord>,
}

impl ChangeTable {
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn extend(&mut self, other: ChangeTable) {
        self.records.extend(other.records);
    }

    pub fn records_of(&self, object: ObjectKind) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter().filter(move |record| record.object == object)
    }

    /// Attribute columns of one kind of record, in first-seen order.
    pub fn columns(&self, object: ObjectKind) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for record in self.records_of(object) {
            for column in record.attributes.keys() {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        columns
    }

    /// Rename attribute columns, keeping their position.
    pub fn rename_columns(&mut self, renames: &BTreeMap<String, String>) {
        self.rename_in(None, renames);
    }

    fn rename_in(&mut self, object: Option<ObjectKind>, renames: &BTreeMap<String, String>) {
        if renames.is_empty() {
            return;
        }
        for record in &mut self.records {
            if object.is_some_and(|object| object != record.object) {
                continue;
            }
            let attributes = std::mem::take(&mut record.attributes);
            record.attributes = attributes
                .into_iter()
                .map(|(column, value)| match renames.get(&column) {
                    Some(renamed) => (renamed.clone(), value),
                    None => (column, value),
                })
                .collect();
        }
    }

    /// Rename a record column to the network column with the same name
    /// ignoring case. Logs write every variable in upper case.
    fn match_network_case(&mut self, object: ObjectKind, network_columns: &[String]) {
        let renames: BTreeMap<String, String> = self
            .columns(object)
            .into_iter()
            .filter(|column| !network_columns.contains(column))
            .filter_map(|column| {
                network_columns
                    .iter()
                    .find(|net| net.eq_ignore_ascii_case(&column))
                    .map(|net| (column, net.clone()))
            })
            .collect();
        if !renames.is_empty() {
            debug!("Renaming {object} columns to network names: {renames:?}");
        }
        self.rename_in(Some(object), &renames);
    }

    pub fn strip_string_columns(&mut self, string_columns: &[String]) {
        for record in &mut self.records {
            for column in string_columns {
                if let Some(Value::String(text)) = record.attributes.get_mut(column) {
                    *text = text.trim_start_matches(' ').to_string();
                }
            }
        }
    }

    /// Give every column the network also carries the network's value type.
    fn coerce_to_network(&mut self, network: &RoadwayNetwork) {
        let link_kinds: BTreeMap<String, ColumnKind> = network
            .link_columns()
            .into_iter()
            .filter_map(|column| {
                let kind = column_kind(network.links.iter().map(|link| link.get(&column)))?;
                Some((column, kind))
            })
            .collect();
        let node_kinds: BTreeMap<String, ColumnKind> = network
            .node_columns()
            .into_iter()
            .filter_map(|column| {
                let kind = column_kind(network.nodes.iter().map(|node| node.get(&column)))?;
                Some((column, kind))
            })
            .collect();

        for record in &mut self.records {
            let kinds = match record.object {
                ObjectKind::Link => &link_kinds,
                ObjectKind::Node => &node_kinds,
            };
            for (column, value) in record.attributes.iter_mut() {
                if let Some(kind) = kinds.get(column) {
                    *value = coerce(value, *kind);
                }
            }
        }
    }

    /// Bring raw change records in line with the base network: apply the
    /// log-to-network crosswalk, match column case, strip leading blanks
    /// from string columns and coerce values to the network's types.
    pub fn prepare(&mut self, network: &RoadwayNetwork, params: &Parameters) {
        self.rename_columns(&params.log_to_net_crosswalk);
        self.match_network_case(ObjectKind::Link, &network.link_columns());
        self.match_network_case(ObjectKind::Node, &network.node_columns());
        self.strip_string_columns(&params.string_columns);
        self.coerce_to_network(network);
    }
}

/// Parse a raw cell the way a CSV reader would infer it.
pub(crate) fn infer_value(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::String(text.to_string()),
    }
}
