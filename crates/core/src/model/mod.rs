//! The roadway network as a travel model sees it: time-of-day and category
//! attributes flattened into columns (`lanes_AM`, `price_sov_PM`),
//! centroid connectors flagged and every output column filled.

pub mod calculated;
pub mod export;
pub mod fixed_width;

use std::path::Path;

use log::{debug, info, warn};
use serde_json::Value;

use crate::columns::column_name_to_parts;
use crate::error::Result;
use crate::parameters::Parameters;
use crate::roadway::time_varying::value_for_period;
use crate::roadway::{value_as_i64, RoadwayNetwork};

pub const GEOMETRY_COLUMN: &str = "geometry";

#[derive(Clone, Debug, PartialEq)]
pub struct ModelRoadwayNetwork {
    pub network: RoadwayNetwork,
    pub params: Parameters,
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty() || s == "NaN",
        Some(Value::Number(n)) => n.as_f64().is_some_and(f64::is_nan),
        _ => false,
    }
}

impl ModelRoadwayNetwork {
    pub fn new(network: RoadwayNetwork, params: Parameters) -> Self {
        Self { network, params }
    }

    pub fn read_dir(dir: &Path, params: Parameters) -> Result<Self> {
        Ok(Self::new(RoadwayNetwork::read_dir(dir)?, params))
    }

    /// Flatten time-varying properties into one column per time period,
    /// and per category where the property is split by category.
    pub fn split_properties_by_time_period_and_category(&mut self) {
        let periods: Vec<(String, _)> = self
            .params
            .transit
            .time_periods
            .iter()
            .map(|(abbr, span)| (abbr.to_string(), *span))
            .collect();

        for (out, split) in &self.params.properties_to_split {
            if !self.network.has_link_column(&split.v) {
                warn!("Specified variable to split: {} not in network variables", split.v);
                continue;
            }
            debug!("Splitting {} into {out}_*", split.v);

            for link in &mut self.network.links {
                let Some(value) = link.properties.get(&split.v).cloned() else {
                    continue;
                };
                for (period, span) in &periods {
                    if split.categories {
                        for (class, lookup) in &self.params.categories {
                            let column = format!("{out}_{class}_{period}");
                            let split_value = value_for_period(&value, span, Some(lookup.as_slice()));
                            link.properties.insert(column, split_value);
                        }
                    } else if split.time_periods {
                        let column = format!("{out}_{period}");
                        link.properties.insert(column, value_for_period(&value, span, None));
                    }
                }
            }
        }
    }

    /// Flag links touching a zone centroid and give them the connector
    /// properties, split columns included.
    pub fn calculate_centroidconnect(&mut self) {
        let highest = self.params.highest_taz_number;
        let columns = self.network.link_columns();
        let mut connectors = 0;

        for link in &mut self.network.links {
            let is_connector = [link.a(), link.b()]
                .into_iter()
                .flatten()
                .any(|node| node <= highest);
            link.properties
                .insert("centroidconnect".to_string(), Value::from(i64::from(is_connector)));
            if !is_connector {
                continue;
            }
            connectors += 1;
            for (property, value) in &self.params.centroid_connector_properties {
                link.properties.insert(property.clone(), value.clone());
                for column in &columns {
                    let parts = column_name_to_parts(column, &self.params);
                    if parts.time_period.is_some() && parts.property_name() == *property {
                        link.properties.insert(column.clone(), value.clone());
                    }
                }
            }
        }
        info!("Flagged {connectors} centroid connectors (highest TAZ {highest})");
    }

    /// Fill missing output values: 0 for numeric columns, "" for string
    /// columns.
    pub fn fill_na(&mut self) {
        info!("Filling missing values in output variables");
        let link_columns = self.output_columns(self.network.link_columns());
        let node_columns = self.output_columns(self.network.node_columns());

        let fill = |column: &str| {
            if self.params.is_string_column(column) {
                Value::from("")
            } else {
                Value::from(0)
            }
        };
        let link_fills: Vec<(String, Value)> = link_columns.iter().map(|c| (c.clone(), fill(c))).collect();
        let node_fills: Vec<(String, Value)> = node_columns.iter().map(|c| (c.clone(), fill(c))).collect();

        for link in &mut self.network.links {
            for (column, value) in &link_fills {
                if is_missing(link.properties.get(column)) {
                    link.properties.insert(column.clone(), value.clone());
                }
            }
        }
        for node in &mut self.network.nodes {
            for (column, value) in &node_fills {
                if is_missing(node.properties.get(column)) {
                    node.properties.insert(column.clone(), value.clone());
                }
            }
        }
    }

    /// Add calculated variables, coerce column types, split properties,
    /// flag centroid connectors and fill missing values.
    pub fn roadway_standard_to_model(&mut self) -> Result<()> {
        info!("Converting standard roadway network to model network");
        self.add_calculated_variables()?;
        self.coerce_types(None);
        self.split_properties_by_time_period_and_category();
        self.calculate_centroidconnect();
        self.fill_na();
        Ok(())
    }

    /// `columns` that are output variables, in network order. The
    /// geometry column is left to the writers.
    fn output_columns(&self, columns: Vec<String>) -> Vec<String> {
        columns
            .into_iter()
            .filter(|c| c != GEOMETRY_COLUMN && self.params.output_variables.contains(c))
            .collect()
    }

    pub fn link_output_variables(&self) -> Vec<String> {
        self.output_columns(self.network.link_columns())
    }

    pub fn node_output_variables(&self) -> Vec<String> {
        self.output_columns(self.network.node_columns())
    }

    /// Whether a column is written as text in model formats.
    pub fn is_string_column<'a>(&self, column: &str, mut values: impl Iterator<Item = Option<&'a Value>>) -> bool {
        self.params.is_string_column(column) || values.any(|v| matches!(v, Some(Value::String(_))))
    }

    pub fn drive_links(&self) -> impl Iterator<Item = &crate::roadway::Link> {
        self.network
            .links
            .iter()
            .filter(|link| link.get("drive_access").and_then(value_as_i64) == Some(1))
    }

    pub fn drive_nodes(&self) -> impl Iterator<Item = &crate::roadway::Node> {
        self.network
            .nodes
            .iter()
            .filter(|node| node.get("drive_node").and_then(value_as_i64) == Some(1))
    }
}
