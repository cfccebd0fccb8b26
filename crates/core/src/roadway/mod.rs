//! Standard roadway network: links, nodes and shapes.
//!
//! Links are read from a JSON array of attribute objects, nodes and shapes
//! from GeoJSON feature collections. Attributes are kept as JSON values so
//! any column survives a read/write cycle.

pub mod apply;
pub mod time_varying;

use std::fs;
use std::path::Path;

use geo::{LineString, Point};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry};
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::card::{RoadwayFacility, Selector};
use crate::error::{LassoError, Result};
use crate::transit::models::types::{value_as_f64, value_to_string};

pub const LINK_FILE: &str = "link.json";
pub const NODE_FILE: &str = "node.geojson";
pub const SHAPE_FILE: &str = "shape.geojson";

// ============================================================================
// Value helpers
// ============================================================================

/// Integer view of a value, accepting integral floats and numeric strings.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numbers compare numerically, everything else by rendered text.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (value_as_f64(a), value_as_f64(b)) {
        (Some(x), Some(y)) if a.is_number() || b.is_number() => x == y,
        _ => value_to_string(a) == value_to_string(b),
    }
}

/// Whether `value` is one of the selector's wanted values.
fn selector_matches(value: Option<&Value>, wanted: &Value) -> bool {
    let Some(value) = value else {
        return false;
    };
    match wanted {
        Value::Array(options) => options.iter().any(|option| values_equal(value, option)),
        single => values_equal(value, single),
    }
}

fn properties_match(properties: &Map<String, Value>, selector: &Selector) -> bool {
    selector
        .iter()
        .all(|(field, wanted)| selector_matches(properties.get(field), wanted))
}

// ============================================================================
// Network elements
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link {
    pub properties: Map<String, Value>,
}

impl Link {
    pub fn new(properties: Map<String, Value>) -> Self {
        Self { properties }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.properties.get(column)
    }

    pub fn model_link_id(&self) -> Option<i64> {
        self.get("model_link_id").and_then(value_as_i64)
    }

    pub fn a(&self) -> Option<i64> {
        self.get("A").and_then(value_as_i64)
    }

    pub fn b(&self) -> Option<i64> {
        self.get("B").and_then(value_as_i64)
    }

    pub fn shape_id(&self) -> Option<String> {
        self.get("shape_id").map(value_to_string)
    }

    /// Identifier used in log messages.
    pub fn label(&self) -> String {
        match self.model_link_id() {
            Some(id) => id.to_string(),
            None => format!("{:?}-{:?}", self.a(), self.b()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub properties: Map<String, Value>,
    pub point: Option<Point<f64>>,
}

impl Node {
    /// Node from attributes carrying `X` and `Y`.
    pub fn from_properties(properties: Map<String, Value>) -> Self {
        let x = properties.get("X").and_then(value_as_f64);
        let y = properties.get("Y").and_then(value_as_f64);
        let point = x.zip(y).map(|(x, y)| Point::new(x, y));
        Self { properties, point }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.properties.get(column)
    }

    pub fn model_node_id(&self) -> Option<i64> {
        self.get("model_node_id").and_then(value_as_i64)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub shape_id: String,
    pub geometry: LineString<f64>,
    pub properties: Map<String, Value>,
}

// ============================================================================
// Network
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoadwayNetwork {
    pub links: Vec<Link>,
    pub nodes: Vec<Node>,
    pub shapes: Vec<Shape>,
}

impl RoadwayNetwork {
    pub fn new(links: Vec<Link>, nodes: Vec<Node>) -> Self {
        Self {
            links,
            nodes,
            shapes: Vec::new(),
        }
    }

    pub fn read(link_file: &Path, node_file: &Path, shape_file: Option<&Path>) -> Result<Self> {
        info!("Reading links from {}", link_file.display());
        let text = fs::read_to_string(link_file).map_err(|e| LassoError::io(link_file, e))?;
        let links: Vec<Link> = serde_json::from_str(&text).map_err(|e| LassoError::json(link_file, e))?;

        info!("Reading nodes from {}", node_file.display());
        let nodes = read_features(node_file)?
            .into_iter()
            .map(node_from_feature)
            .collect::<Result<Vec<_>>>()?;

        let shapes = match shape_file {
            Some(path) => {
                info!("Reading shapes from {}", path.display());
                read_features(path)?
                    .into_iter()
                    .filter_map(shape_from_feature)
                    .collect()
            }
            None => Vec::new(),
        };

        info!(
            "Roadway network has {} links, {} nodes, {} shapes",
            links.len(),
            nodes.len(),
            shapes.len()
        );
        Ok(Self { links, nodes, shapes })
    }

    /// Read `link.json`, `node.geojson` and, when present, `shape.geojson`.
    pub fn read_dir(dir: &Path) -> Result<Self> {
        let shape_file = dir.join(SHAPE_FILE);
        Self::read(
            &dir.join(LINK_FILE),
            &dir.join(NODE_FILE),
            shape_file.is_file().then_some(shape_file.as_path()),
        )
    }

    /// Write `{prefix}link.json`, `{prefix}node.geojson` and
    /// `{prefix}shape.geojson` into `dir`.
    pub fn write(&self, dir: &Path, prefix: &str) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| LassoError::io(dir, e))?;

        let link_path = dir.join(format!("{prefix}{LINK_FILE}"));
        let links = serde_json::to_string_pretty(&self.links).map_err(|e| LassoError::json(&link_path, e))?;
        fs::write(&link_path, links).map_err(|e| LassoError::io(&link_path, e))?;

        let node_path = dir.join(format!("{prefix}{NODE_FILE}"));
        let nodes = self
            .nodes
            .iter()
            .map(|node| feature(node.point.as_ref().map(geojson::Value::from), &node.properties))
            .collect();
        write_features(&node_path, nodes)?;

        let shape_path = dir.join(format!("{prefix}{SHAPE_FILE}"));
        let shapes = self
            .shapes
            .iter()
            .map(|shape| {
                let mut properties = shape.properties.clone();
                properties.insert("shape_id".to_string(), Value::from(shape.shape_id.clone()));
                feature(Some(geojson::Value::from(&shape.geometry)), &properties)
            })
            .collect();
        write_features(&shape_path, shapes)?;

        info!("Wrote roadway network to {}", dir.display());
        Ok(())
    }

    /// Link columns in first-seen order.
    pub fn link_columns(&self) -> Vec<String> {
        self.links
            .iter()
            .flat_map(|link| link.properties.keys())
            .unique()
            .cloned()
            .collect()
    }

    pub fn node_columns(&self) -> Vec<String> {
        self.nodes
            .iter()
            .flat_map(|node| node.properties.keys())
            .unique()
            .cloned()
            .collect()
    }

    pub fn has_link_column(&self, column: &str) -> bool {
        self.links.iter().any(|link| link.properties.contains_key(column))
    }

    pub fn links_by_ab(&self, a: i64, b: i64) -> Vec<usize> {
        self.links
            .iter()
            .positions(|link| link.a() == Some(a) && link.b() == Some(b))
            .collect()
    }

    pub fn link_index(&self, model_link_id: i64) -> Option<usize> {
        self.links.iter().position(|link| link.model_link_id() == Some(model_link_id))
    }

    pub fn node_index(&self, model_node_id: i64) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| node.model_node_id() == Some(model_node_id))
    }

    /// Indices of links matching every criterion of the facility.
    pub fn select(&self, facility: &RoadwayFacility) -> Vec<usize> {
        let endpoint_matches = |id: Option<i64>, selector: &Option<Selector>| match selector {
            None => true,
            Some(selector) => id
                .and_then(|id| self.node_index(id))
                .is_some_and(|i| properties_match(&self.nodes[i].properties, selector)),
        };

        let selected: Vec<usize> = self
            .links
            .iter()
            .positions(|link| {
                facility
                    .link
                    .iter()
                    .all(|selector| properties_match(&link.properties, selector))
                    && endpoint_matches(link.a(), &facility.a)
                    && endpoint_matches(link.b(), &facility.b)
            })
            .collect();
        debug!("Facility selected {} links", selected.len());
        selected
    }

    pub fn select_nodes(&self, selector: &Selector) -> Vec<usize> {
        self.nodes
            .iter()
            .positions(|node| properties_match(&node.properties, selector))
            .collect()
    }

    pub fn shape(&self, shape_id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|shape| shape.shape_id == shape_id)
    }

    /// Geometry of a link: its shape, or a straight line between its nodes.
    pub fn link_geometry(&self, link: &Link) -> Option<LineString<f64>> {
        if let Some(shape) = link.shape_id().and_then(|id| self.shape(&id)) {
            return Some(shape.geometry.clone());
        }
        let a = self.nodes.get(self.node_index(link.a()?)?)?.point?;
        let b = self.nodes.get(self.node_index(link.b()?)?)?.point?;
        Some(LineString::from(vec![(a.x(), a.y()), (b.x(), b.y())]))
    }
}

// ============================================================================
// GeoJSON
// ============================================================================

pub(crate) fn read_features(path: &Path) -> Result<Vec<Feature>> {
    let text = fs::read_to_string(path).map_err(|e| LassoError::io(path, e))?;
    let geojson: GeoJson = text.parse().map_err(|e| LassoError::geojson(path, e))?;
    let collection = FeatureCollection::try_from(geojson).map_err(|e| LassoError::geojson(path, e))?;
    Ok(collection.features)
}

fn write_features(path: &Path, features: Vec<Feature>) -> Result<()> {
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    fs::write(path, collection.to_string()).map_err(|e| LassoError::io(path, e))
}

pub(crate) fn feature(geometry: Option<geojson::Value>, properties: &Map<String, Value>) -> Feature {
    Feature {
        bbox: None,
        geometry: geometry.map(Geometry::new),
        id: None,
        properties: Some(properties.clone()),
        foreign_members: None,
    }
}

fn node_from_feature(feature: Feature) -> Result<Node> {
    let mut properties = feature.properties.unwrap_or_default();
    let point = match feature.geometry {
        Some(geometry) => Some(
            Point::<f64>::try_from(geometry.value)
                .map_err(|e| LassoError::Network(format!("node geometry is not a point: {e}")))?,
        ),
        None => None,
    };
    let Some(point) = point else {
        return Ok(Node::from_properties(properties));
    };
    properties.entry("X").or_insert_with(|| Value::from(point.x()));
    properties.entry("Y").or_insert_with(|| Value::from(point.y()));
    Ok(Node {
        properties,
        point: Some(point),
    })
}

fn shape_from_feature(feature: Feature) -> Option<Shape> {
    let properties = feature.properties.unwrap_or_default();
    let shape_id = properties
        .get("shape_id")
        .or_else(|| properties.get("id"))
        .map(value_to_string)?;
    let geometry = LineString::<f64>::try_from(feature.geometry?.value).ok()?;
    Some(Shape {
        shape_id,
        geometry,
        properties,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn link(id: i64, a: i64, b: i64, extra: Value) -> Link {
        let mut properties = Map::new();
        properties.insert("model_link_id".to_string(), json!(id));
        properties.insert("A".to_string(), json!(a));
        properties.insert("B".to_string(), json!(b));
        if let Value::Object(extra) = extra {
            properties.extend(extra);
        }
        Link::new(properties)
    }

    pub(crate) fn node(id: i64, x: f64, y: f64) -> Node {
        let mut properties = Map::new();
        properties.insert("model_node_id".to_string(), json!(id));
        properties.insert("X".to_string(), json!(x));
        properties.insert("Y".to_string(), json!(y));
        Node::from_properties(properties)
    }

    pub(crate) fn sample_network() -> RoadwayNetwork {
        RoadwayNetwork::new(
            vec![
                link(1, 1, 10001, json!({"lanes": 1, "name": "connector", "drive_access": 1})),
                link(2, 10001, 10002, json!({"lanes": 2, "name": "Highland Ave", "drive_access": 1})),
                link(3, 10002, 10001, json!({"lanes": 2, "name": "Highland Ave", "drive_access": 0})),
            ],
            vec![node(1, 0.0, 0.0), node(10001, 1.0, 0.0), node(10002, 2.0, 0.0)],
        )
    }

    #[test]
    fn test_select_by_link_and_endpoint() {
        let net = sample_network();
        let mut selector = Selector::new();
        selector.insert("name".to_string(), json!("Highland Ave"));
        let facility = RoadwayFacility {
            link: vec![selector],
            ..Default::default()
        };
        assert_eq!(net.select(&facility), vec![1, 2]);

        let mut a = Selector::new();
        a.insert("model_node_id".to_string(), json!([10002]));
        let facility = RoadwayFacility { a: Some(a), ..facility };
        assert_eq!(net.select(&facility), vec![2]);
        assert_eq!(net.select(&RoadwayFacility::for_links(vec![json!("1")])), vec![0]);
    }

    #[test]
    fn test_write_and_read_dir() {
        let dir = std::env::temp_dir().join(format!("lasso-roadway-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let net = sample_network();
        net.write(&dir, "").unwrap();

        let reread = RoadwayNetwork::read_dir(&dir).unwrap();
        assert_eq!(reread.links, net.links);
        assert_eq!(reread.nodes.len(), 3);
        assert_eq!(reread.nodes[2].point, Some(Point::new(2.0, 0.0)));
        assert_eq!(reread.link_columns(), vec!["model_link_id", "A", "B", "lanes", "name", "drive_access"]);
    }

    #[test]
    fn test_link_geometry_falls_back_to_nodes() {
        let net = sample_network();
        let line = net.link_geometry(&net.links[1]).unwrap();
        assert_eq!(line.0.len(), 2);
        assert_eq!(line.0[1].x, 2.0);
    }

    #[test]
    fn test_values_equal_across_types() {
        assert!(values_equal(&json!(1), &json!("1")));
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!("a"), &json!("b")));
        assert_eq!(value_as_i64(&json!(3.0)), Some(3));
    }
}
