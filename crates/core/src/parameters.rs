//! Settings shared by every step: time periods, user classes, column lists
//! and output file names.
//!
//! Every field has a default, so a parameter file only names what it
//! overrides. Transit settings are flattened into the same document.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use crate::error::{LassoError, Result};
use crate::transit::parameters::TransitParameters;

/// Columns written to model formats, in output order.
pub const DEFAULT_OUTPUT_VARIABLES: &[&str] = &[
    "model_link_id",
    "A",
    "B",
    "shstGeometryId",
    "distance",
    "roadway",
    "name",
    "roadway_class",
    "bike_access",
    "walk_access",
    "drive_access",
    "truck_access",
    "trn_priority_AM",
    "trn_priority_MD",
    "trn_priority_PM",
    "trn_priority_NT",
    "ttime_assert_AM",
    "ttime_assert_MD",
    "ttime_assert_PM",
    "ttime_assert_NT",
    "lanes_AM",
    "lanes_MD",
    "lanes_PM",
    "lanes_NT",
    "price_sov_AM",
    "price_hov2_AM",
    "price_hov3_AM",
    "price_truck_AM",
    "price_sov_MD",
    "price_hov2_MD",
    "price_hov3_MD",
    "price_truck_MD",
    "price_sov_PM",
    "price_hov2_PM",
    "price_hov3_PM",
    "price_truck_PM",
    "price_sov_NT",
    "price_hov2_NT",
    "price_hov3_NT",
    "price_truck_NT",
    "roadway_class_idx",
    "facility_type",
    "county",
    "centroidconnect",
    "model_node_id",
    "N",
    "osm_node_id",
    "bike_node",
    "transit_node",
    "walk_node",
    "drive_node",
    "geometry",
    "X",
    "Y",
    "ML_lanes_AM",
    "ML_lanes_MD",
    "ML_lanes_PM",
    "ML_lanes_NT",
    "segment_id",
    "managed",
    "bus_only",
    "rail_only",
];

/// A link variable written out once per time period (and user class).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitProperty {
    /// Source variable on the links
    pub v: String,
    #[serde(default = "default_true")]
    pub time_periods: bool,
    #[serde(default)]
    pub categories: bool,
}

fn default_true() -> bool {
    true
}

impl SplitProperty {
    fn by_time(v: &str) -> Self {
        Self {
            v: v.to_string(),
            time_periods: true,
            categories: false,
        }
    }
}

/// Type a model column is coerced to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    Int,
    Float,
    #[serde(alias = "string")]
    Str,
}

/// Link variables calculated before a network is written for the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CalculatedVariable {
    /// `HOV`: 100 on HOV links, else 0
    Hov,
    /// `ML_lanes` placeholder, 0 until a card sets it
    ManagedLanes,
    /// `segment_id` placeholder for HOV corridors
    HovCorridor,
    /// `county` code from the polygon containing each link centroid
    County,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFiles {
    pub links_csv: String,
    pub nodes_csv: String,
    pub links_fixed_width: String,
    pub nodes_fixed_width: String,
    pub links_header_width: String,
    pub nodes_header_width: String,
    pub cube_script: String,
    pub links_geojson: String,
    pub nodes_geojson: String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            links_csv: "links.csv".to_string(),
            nodes_csv: "nodes.csv".to_string(),
            links_fixed_width: "links.txt".to_string(),
            nodes_fixed_width: "nodes.txt".to_string(),
            links_header_width: "links_header_width.txt".to_string(),
            nodes_header_width: "nodes_header_width.txt".to_string(),
            cube_script: "make_complete_network_from_fixed_width_file.s".to_string(),
            links_geojson: "links.geojson".to_string(),
            nodes_geojson: "nodes.geojson".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    #[serde(flatten)]
    pub transit: TransitParameters,
    pub time_period_names: BTreeMap<String, String>,
    /// User class to the categories looked up for it, in order
    pub categories: BTreeMap<String, Vec<String>>,
    /// Output column prefix to the variable it is split from
    pub properties_to_split: BTreeMap<String, SplitProperty>,
    pub highest_taz_number: i64,
    pub centroid_connector_properties: Map<String, Value>,
    pub output_variables: Vec<String>,
    pub string_columns: Vec<String>,
    /// Log column name to network column name
    pub log_to_net_crosswalk: BTreeMap<String, String>,
    /// Never written as property changes
    pub static_values: Vec<String>,
    /// Written with `set` only
    pub calculated_values: Vec<String>,
    pub output_files: OutputFiles,
    /// Fixed-width column widths; computed from the data when absent
    pub fixed_width_columns: Option<BTreeMap<String, usize>>,
    pub calculated_variables: Vec<CalculatedVariable>,
    /// GeoJSON polygons with one feature per county
    pub county_shape: Option<PathBuf>,
    /// County name property on the county polygons
    pub county_variable_shp: String,
    /// County name to model county code
    pub county_code_dict: BTreeMap<String, i64>,
    /// Code for links outside every county polygon
    pub external_county_code: i64,
    pub field_types: BTreeMap<String, FieldType>,
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for Parameters {
    fn default() -> Self {
        let categories = [
            ("sov", &["sov", "default"][..]),
            ("hov2", &["hov2", "default", "sov"][..]),
            ("hov3", &["hov3", "hov2", "default", "sov"][..]),
            ("truck", &["trk", "sov", "default"][..]),
        ]
        .into_iter()
        .map(|(class, lookup)| (class.to_string(), strings(lookup)))
        .collect();

        let mut properties_to_split: BTreeMap<String, SplitProperty> = [
            ("trn_priority", "transit_priority"),
            ("ttime_assert", "traveltime_assert"),
            ("lanes", "lanes"),
            ("ML_lanes", "ML_lanes"),
            ("access", "access"),
        ]
        .into_iter()
        .map(|(out, v)| (out.to_string(), SplitProperty::by_time(v)))
        .collect();
        properties_to_split.insert(
            "price".to_string(),
            SplitProperty {
                v: "price".to_string(),
                time_periods: true,
                categories: true,
            },
        );

        let field_types = [
            ("model_link_id", FieldType::Int),
            ("model_node_id", FieldType::Int),
            ("A", FieldType::Int),
            ("B", FieldType::Int),
            ("N", FieldType::Int),
            ("lanes", FieldType::Int),
            ("ML_lanes", FieldType::Int),
            ("HOV", FieldType::Int),
            ("segment_id", FieldType::Int),
            ("county", FieldType::Int),
            ("centroidconnect", FieldType::Int),
            ("drive_access", FieldType::Int),
            ("walk_access", FieldType::Int),
            ("bike_access", FieldType::Int),
            ("truck_access", FieldType::Int),
            ("drive_node", FieldType::Int),
            ("walk_node", FieldType::Int),
            ("bike_node", FieldType::Int),
            ("transit_node", FieldType::Int),
            ("distance", FieldType::Float),
            ("X", FieldType::Float),
            ("Y", FieldType::Float),
            ("name", FieldType::Str),
            ("roadway", FieldType::Str),
            ("shstGeometryId", FieldType::Str),
            ("osm_node_id", FieldType::Str),
        ]
        .into_iter()
        .map(|(column, kind)| (column.to_string(), kind))
        .collect();

        let mut centroid_connector_properties = Map::new();
        centroid_connector_properties.insert("centroidconnect".to_string(), Value::from(1));
        centroid_connector_properties.insert("lanes".to_string(), Value::from(1));

        Self {
            transit: TransitParameters::default(),
            time_period_names: string_map(&[
                ("AM", "AM Peak"),
                ("MD", "Midday"),
                ("PM", "PM Peak"),
                ("NT", "Evening/Night"),
            ]),
            categories,
            properties_to_split,
            highest_taz_number: 9999,
            centroid_connector_properties,
            output_variables: strings(DEFAULT_OUTPUT_VARIABLES),
            string_columns: strings(&["name", "roadway", "shstGeometryId", "osm_node_id", "county"]),
            log_to_net_crosswalk: string_map(&[("N", "model_node_id")]),
            static_values: strings(&["model_link_id", "area_type", "county", "centroidconnect"]),
            calculated_values: strings(&["area_type", "county", "assign_group", "centroidconnect"]),
            output_files: OutputFiles::default(),
            fixed_width_columns: None,
            calculated_variables: vec![
                CalculatedVariable::Hov,
                CalculatedVariable::ManagedLanes,
                CalculatedVariable::HovCorridor,
            ],
            county_shape: None,
            county_variable_shp: "CO_NAME".to_string(),
            county_code_dict: BTreeMap::new(),
            external_county_code: 10,
            field_types,
        }
    }
}

impl Parameters {
    /// Read a YAML (`.yml`/`.yaml`) or JSON parameter file and validate it.
    pub fn from_path(path: &Path) -> Result<Self> {
        info!("Reading parameters from {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| LassoError::io(path, e))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));

        let params: Self = if is_yaml {
            serde_yaml::from_str(&text).map_err(|e| LassoError::yaml(path, e))?
        } else {
            serde_json::from_str(&text).map_err(|e| LassoError::json(path, e))?
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        self.transit
            .validate()
            .map_err(|e| LassoError::Parameters(e.to_string()))?;

        for (out, split) in &self.properties_to_split {
            if split.categories && !split.time_periods {
                return Err(LassoError::Parameters(format!(
                    "{out}: a split by category also needs a split by time period"
                )));
            }
            if split.categories && self.categories.is_empty() {
                return Err(LassoError::Parameters(format!(
                    "{out} is split by category but no categories are defined"
                )));
            }
        }
        if let Some((class, _)) = self.categories.iter().find(|(_, lookup)| lookup.is_empty()) {
            return Err(LassoError::Parameters(format!(
                "category {class} has an empty lookup list"
            )));
        }
        if self.calculated_variables.contains(&CalculatedVariable::County) {
            if self.county_shape.is_none() {
                return Err(LassoError::Parameters(
                    "county is calculated but no county_shape is given".to_string(),
                ));
            }
            if self.county_code_dict.is_empty() {
                return Err(LassoError::Parameters("No county codes dictionary specified".to_string()));
            }
        }
        Ok(())
    }

    /// Network time period abbreviations, e.g. `AM`.
    pub fn time_period_abbreviations(&self) -> impl Iterator<Item = &str> {
        self.transit.time_periods.abbreviations()
    }

    /// A typed column is text only when typed `str`; otherwise
    /// `string_columns` decides.
    pub fn is_string_column(&self, column: &str) -> bool {
        match self.field_types.get(column) {
            Some(kind) => *kind == FieldType::Str,
            None => self.string_columns.iter().any(|c| c == column),
        }
    }

    pub fn is_static(&self, column: &str) -> bool {
        self.static_values.iter().any(|c| c == column)
    }

    pub fn is_calculated(&self, column: &str) -> bool {
        self.calculated_values.iter().any(|c| c == column)
    }
}
