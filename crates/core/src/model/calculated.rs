//! Link variables the model needs but the standard network does not carry,
//! and column type coercion.

use std::path::Path;

use geo::{Centroid, Geometry, Intersects, MultiPolygon, Point};
use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::error::{LassoError, Result};
use crate::model::ModelRoadwayNetwork;
use crate::parameters::{CalculatedVariable, FieldType};
use crate::roadway::{read_features, value_as_i64};
use crate::transit::models::types::{value_as_f64, value_to_string};

pub const HOV_COLUMN: &str = "HOV";
pub const MANAGED_LANES_COLUMN: &str = "ML_lanes";
pub const HOV_CORRIDOR_COLUMN: &str = "segment_id";
pub const COUNTY_COLUMN: &str = "county";

/// Polygons read from a GeoJSON file, each with its feature properties.
#[derive(Clone, Debug, Default)]
pub struct PolygonOverlay {
    pub regions: Vec<(MultiPolygon<f64>, Map<String, Value>)>,
}

impl PolygonOverlay {
    /// Features that are not polygons are skipped.
    pub fn read(path: &Path) -> Result<Self> {
        let mut regions = Vec::new();
        for feature in read_features(path)? {
            let properties = feature.properties.unwrap_or_default();
            let Some(geometry) = feature.geometry else {
                continue;
            };
            let polygons = match Geometry::<f64>::try_from(geometry.value) {
                Ok(Geometry::Polygon(polygon)) => MultiPolygon::new(vec![polygon]),
                Ok(Geometry::MultiPolygon(polygons)) => polygons,
                Ok(_) | Err(_) => {
                    warn!("{}: skipping a feature that is not a polygon", path.display());
                    continue;
                }
            };
            regions.push((polygons, properties));
        }
        info!("Read {} overlay polygons from {}", regions.len(), path.display());
        Ok(Self { regions })
    }

    /// `field` of the first polygon the point falls in.
    pub fn lookup(&self, point: &Point<f64>, field: &str) -> Option<&Value> {
        self.regions
            .iter()
            .find(|(polygons, _)| polygons.intersects(point))
            .and_then(|(_, properties)| properties.get(field))
    }
}

/// Convert a scalar to `kind`. `None` when the value does not convert;
/// time-varying objects and arrays are left alone.
fn coerce_value(value: &Value, kind: FieldType) -> Option<Value> {
    match value {
        Value::Null | Value::Object(_) | Value::Array(_) => return Some(value.clone()),
        Value::String(s) if s.trim().is_empty() => return Some(Value::Null),
        _ => {}
    }
    match kind {
        FieldType::Str => Some(Value::from(value_to_string(value))),
        FieldType::Int => match value {
            Value::Bool(b) => Some(Value::from(i64::from(*b))),
            _ => value_as_i64(value)
                .or_else(|| value_as_f64(value).filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
                .map(Value::from),
        },
        FieldType::Float => match value {
            Value::Bool(b) => Some(Value::from(f64::from(u8::from(*b)))),
            _ => value_as_f64(value).map(Value::from),
        },
    }
}

fn coerce_records<'a>(
    records: impl Iterator<Item = &'a mut Map<String, Value>>,
    column: &str,
    kind: FieldType,
) -> usize {
    let mut failed = 0;
    for record in records {
        let Some(value) = record.get_mut(column) else {
            continue;
        };
        match coerce_value(value, kind) {
            Some(coerced) => *value = coerced,
            None => failed += 1,
        }
    }
    failed
}

impl ModelRoadwayNetwork {
    /// Whether `column` should be (re)written. Logs when it is kept.
    fn should_write(&self, column: &str, overwrite: bool) -> bool {
        if !self.network.has_link_column(column) {
            return true;
        }
        if overwrite {
            info!("Overwriting existing variable '{column}' already in network");
        } else {
            info!("Variable '{column}' already in network. Returning without overwriting.");
        }
        overwrite
    }

    /// `HOV` is 100 on links with `assign_group` 8 or `access` "hov", else 0.
    pub fn calculate_hov(&mut self, overwrite: bool) {
        if !self.should_write(HOV_COLUMN, overwrite) {
            return;
        }
        let mut hov = 0;
        for link in &mut self.network.links {
            let is_hov = link.get("assign_group").and_then(value_as_i64) == Some(8)
                || link.get("access").and_then(Value::as_str) == Some("hov");
            hov += usize::from(is_hov);
            link.properties
                .insert(HOV_COLUMN.to_string(), Value::from(if is_hov { 100 } else { 0 }));
        }
        info!("Finished calculating hov variable: {hov} HOV links");
    }

    /// `ML_lanes` set to 0 so managed lane cards have a column to change.
    pub fn create_managed_lane_variable(&mut self, overwrite: bool) {
        self.create_placeholder(MANAGED_LANES_COLUMN, overwrite);
    }

    /// `segment_id` set to 0 so HOV corridor cards have a column to change.
    pub fn create_hov_corridor_variable(&mut self, overwrite: bool) {
        self.create_placeholder(HOV_CORRIDOR_COLUMN, overwrite);
    }

    fn create_placeholder(&mut self, column: &str, overwrite: bool) {
        if !self.should_write(column, overwrite) {
            return;
        }
        for link in &mut self.network.links {
            link.properties.insert(column.to_string(), Value::from(0));
        }
        info!("Finished creating variable: {column}");
    }

    /// Set `network_variable` on each link to `field` of the overlay polygon
    /// containing the link centroid, or null outside every polygon. Returns
    /// the number of links inside a polygon.
    pub fn add_polygon_overlay_to_links(
        &mut self,
        overlay: &PolygonOverlay,
        field: &str,
        network_variable: &str,
        overwrite: bool,
    ) -> usize {
        if !self.should_write(network_variable, overwrite) {
            return 0;
        }
        debug!("Adding overlay field {field} as {network_variable}");
        let values: Vec<Option<Value>> = self
            .network
            .links
            .iter()
            .map(|link| {
                let centroid = self.network.link_geometry(link)?.centroid()?;
                overlay.lookup(&centroid, field).cloned()
            })
            .collect();

        let matched = values.iter().filter(|v| v.is_some()).count();
        for (link, value) in self.network.links.iter_mut().zip(values) {
            link.properties
                .insert(network_variable.to_string(), value.unwrap_or(Value::Null));
        }
        matched
    }

    /// `county` code of the county polygon holding each link centroid.
    /// Unknown county names and links outside every polygon get the
    /// external code.
    pub fn calculate_county(&mut self, overwrite: bool) -> Result<()> {
        if !self.should_write(COUNTY_COLUMN, overwrite) {
            return Ok(());
        }
        let shape = self
            .params
            .county_shape
            .clone()
            .ok_or_else(|| LassoError::Parameters("No county shape specified".to_string()))?;
        if self.params.county_code_dict.is_empty() {
            return Err(LassoError::Parameters("No county codes dictionary specified".to_string()));
        }
        info!(
            "Adding roadway network variable for county using a spatial join with: {}",
            shape.display()
        );

        let overlay = PolygonOverlay::read(&shape)?;
        let field = self.params.county_variable_shp.clone();
        let matched = self.add_polygon_overlay_to_links(&overlay, &field, COUNTY_COLUMN, true);

        let codes = &self.params.county_code_dict;
        let external = self.params.external_county_code;
        for link in &mut self.network.links {
            let code = link
                .get(COUNTY_COLUMN)
                .and_then(|name| codes.get(&value_to_string(name)))
                .copied()
                .unwrap_or(external);
            link.properties.insert(COUNTY_COLUMN.to_string(), Value::from(code));
        }
        info!(
            "Finished calculating county variable: {matched} of {} links inside a county",
            self.network.links.len()
        );
        Ok(())
    }

    /// Calculate every variable named in the parameters, keeping columns
    /// the network already has.
    pub fn add_calculated_variables(&mut self) -> Result<()> {
        for variable in self.params.calculated_variables.clone() {
            debug!("Calculating {variable}");
            match variable {
                CalculatedVariable::Hov => self.calculate_hov(false),
                CalculatedVariable::ManagedLanes => self.create_managed_lane_variable(false),
                CalculatedVariable::HovCorridor => self.create_hov_corridor_variable(false),
                CalculatedVariable::County => self.calculate_county(false)?,
            }
        }
        Ok(())
    }

    /// Coerce link and node columns to the types in `field_types`, with
    /// `overrides` taking precedence. Values that do not convert are kept
    /// and logged; empty strings become null for `fill_na`.
    pub fn coerce_types(&mut self, overrides: Option<&std::collections::BTreeMap<String, FieldType>>) {
        let mut lookup = self.params.field_types.clone();
        if let Some(overrides) = overrides {
            lookup.extend(overrides.iter().map(|(c, t)| (c.clone(), *t)));
        }
        debug!("Coercing types based on: {lookup:?}");

        for (column, kind) in &lookup {
            let failed = coerce_records(self.network.links.iter_mut().map(|l| &mut l.properties), column, *kind)
                + coerce_records(self.network.nodes.iter_mut().map(|n| &mut n.properties), column, *kind);
            if failed > 0 {
                warn!("couldn't coerce {failed} values of column {column} to {kind}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Parameters;
    use crate::roadway::tests::{link, node};
    use crate::roadway::RoadwayNetwork;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::fs;

    fn model() -> ModelRoadwayNetwork {
        let network = RoadwayNetwork::new(
            vec![
                link(1, 1, 2, json!({"assign_group": 8, "lanes": "2"})),
                link(2, 2, 3, json!({"access": "hov", "lanes": 1.0, "name": 35})),
                link(3, 3, 4, json!({"access": "any", "lanes": "", "distance": "0.25"})),
            ],
            vec![node(1, 0.5, 0.5), node(2, 1.5, 0.5), node(3, 2.5, 0.5), node(4, 3.5, 0.5)],
        );
        ModelRoadwayNetwork::new(network, Parameters::default())
    }

    /// West county covers x in [0, 2], east county x in [2, 3].
    fn write_counties(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("lasso-counties-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let square = |x0: f64, x1: f64| json!([[[x0, 0.0], [x1, 0.0], [x1, 1.0], [x0, 1.0], [x0, 0.0]]]);
        let counties = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Polygon", "coordinates": square(0.0, 2.0)},
                 "properties": {"CO_NAME": "Ramsey"}},
                {"type": "Feature", "geometry": {"type": "MultiPolygon", "coordinates": [square(2.0, 3.0)]},
                 "properties": {"CO_NAME": "Washington"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [9.0, 9.0]},
                 "properties": {"CO_NAME": "Nowhere"}}
            ]
        });
        let path = dir.join("counties.geojson");
        fs::write(&path, counties.to_string()).unwrap();
        path
    }

    #[test]
    fn test_hov_from_assign_group_or_access() {
        let mut model = model();
        model.calculate_hov(false);
        let hov: Vec<_> = model.network.links.iter().map(|l| l.get(HOV_COLUMN).cloned()).collect();
        assert_eq!(hov, vec![Some(json!(100)), Some(json!(100)), Some(json!(0))]);
    }

    #[test]
    fn test_placeholders_keep_existing_columns() {
        let mut model = model();
        model.network.links[0].properties.insert("segment_id".to_string(), json!(7));
        model.create_managed_lane_variable(false);
        model.create_hov_corridor_variable(false);
        assert_eq!(model.network.links[1].get("ML_lanes"), Some(&json!(0)));
        assert_eq!(model.network.links[0].get("segment_id"), Some(&json!(7)));
        assert_eq!(model.network.links[1].get("segment_id"), None);

        model.create_hov_corridor_variable(true);
        assert_eq!(model.network.links[0].get("segment_id"), Some(&json!(0)));
    }

    #[test]
    fn test_county_from_link_centroid() {
        let mut model = model();
        model.params.county_shape = Some(write_counties("centroid"));
        model.params.county_code_dict = BTreeMap::from([("Ramsey".to_string(), 5), ("Washington".to_string(), 7)]);
        model.calculate_county(false).unwrap();
        // Centroids at x = 1.0, 2.0, 3.0; the last lies on the east edge.
        let counties: Vec<_> = model.network.links.iter().map(|l| l.get(COUNTY_COLUMN).cloned()).collect();
        assert_eq!(counties[0], Some(json!(5)));
        assert_eq!(counties[2], Some(json!(7)));

        model.network.nodes[3].point = Some(Point::new(8.5, 0.5));
        model.network.nodes[2].point = Some(Point::new(7.5, 0.5));
        model.calculate_county(true).unwrap();
        assert_eq!(model.network.links[2].get(COUNTY_COLUMN), Some(&json!(10)));
    }

    #[test]
    fn test_county_needs_codes() {
        let mut model = model();
        model.params.county_shape = Some(write_counties("codes"));
        let err = model.calculate_county(false).unwrap_err();
        assert!(err.to_string().contains("county codes"));
        assert!(!model.network.has_link_column(COUNTY_COLUMN));
    }

    #[test]
    fn test_overlay_skips_non_polygons() {
        let overlay = PolygonOverlay::read(&write_counties("overlay")).unwrap();
        assert_eq!(overlay.regions.len(), 2);
        assert_eq!(overlay.lookup(&Point::new(2.5, 0.5), "CO_NAME"), Some(&json!("Washington")));
        assert_eq!(overlay.lookup(&Point::new(9.0, 9.0), "CO_NAME"), None);
    }

    #[test]
    fn test_coerce_types() {
        let mut model = model();
        let overrides = BTreeMap::from([("access".to_string(), FieldType::Int)]);
        model.coerce_types(Some(&overrides));
        let links = &model.network.links;
        assert_eq!(links[0].get("lanes"), Some(&json!(2)));
        assert_eq!(links[1].get("lanes"), Some(&json!(1)));
        assert_eq!(links[2].get("lanes"), Some(&Value::Null));
        assert_eq!(links[1].get("name"), Some(&json!("35")));
        assert_eq!(links[2].get("distance"), Some(&json!(0.25)));
        // Not numeric, so left as it was.
        assert_eq!(links[1].get("access"), Some(&json!("hov")));
        assert_eq!(model.network.nodes[0].get("model_node_id"), Some(&json!(1)));
    }

    #[test]
    fn test_coerce_leaves_time_varying_values() {
        let lanes = json!({"default": 2, "timeofday": [{"time": ["6:00", "9:00"], "value": 3}]});
        assert_eq!(coerce_value(&lanes, FieldType::Int), Some(lanes.clone()));
        assert_eq!(coerce_value(&json!(2.7), FieldType::Int), Some(json!(2)));
        assert_eq!(coerce_value(&json!(true), FieldType::Float), Some(json!(1.0)));
        assert_eq!(coerce_value(&json!("x"), FieldType::Float), None);
    }
}
