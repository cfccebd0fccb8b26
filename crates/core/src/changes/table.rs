//! Roadway changes given as a CSV table or a GeoJSON feature collection.
//!
//! Rows carry `OBJECT` and `OPERATION` columns (defaulting to `L` and `C`)
//! next to the changed attributes. Node rows without a `model_node_id` get 0.

use std::fs;
use std::path::Path;

use geojson::GeoJson;
use log::info;
use serde_json::{Map, Value};

use crate::changes::{infer_value, ChangeRecord, ChangeTable, ObjectKind};
use crate::error::{LassoError, Result};

fn finish(records: Vec<ChangeRecord>, path: &Path) -> ChangeTable {
    let mut table = ChangeTable::new(records);
    for record in &mut table.records {
        if record.object == ObjectKind::Node && record.get("model_node_id").is_none() {
            record.attributes.insert("model_node_id".to_string(), Value::from(0));
        }
    }
    info!("Read {} change records from {}", table.len(), path.display());
    table
}

pub fn read_csv_changes(path: &Path) -> Result<ChangeTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| LassoError::csv(path, e))?;
    let headers = reader.headers().map_err(|e| LassoError::csv(path, e))?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| LassoError::csv(path, e))?;
        let attributes: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(column, field)| (column.to_string(), infer_value(field)))
            .collect();
        records.push(ChangeRecord::from_attributes(attributes)?);
    }
    Ok(finish(records, path))
}

/// Geometry is dropped; only feature properties are read.
pub fn read_geojson_changes(path: &Path) -> Result<ChangeTable> {
    let text = fs::read_to_string(path).map_err(|e| LassoError::io(path, e))?;
    let geojson: GeoJson = text.parse().map_err(|e| LassoError::geojson(path, e))?;
    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(LassoError::InvalidChanges(format!(
                "{} holds a bare geometry, expected features",
                path.display()
            )));
        }
    };

    let records = features
        .into_iter()
        .map(|feature| ChangeRecord::from_attributes(feature.properties.unwrap_or_default()))
        .collect::<Result<Vec<_>>>()?;
    Ok(finish(records, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::Operation;
    use serde_json::json;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("lasso-table-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_csv_changes_with_defaults() {
        let path = temp_file("changes.csv", "A,B,lanes,name\n10001,10002,3,Main St\n");
        let table = read_csv_changes(&path).unwrap();
        assert_eq!(table.len(), 1);
        let record = &table.records[0];
        assert_eq!(record.object, ObjectKind::Link);
        assert_eq!(record.operation, Operation::Change);
        assert_eq!(record.get("lanes"), Some(&json!(3)));
        assert_eq!(record.get("model_node_id"), None);
    }

    #[test]
    fn test_geojson_changes() {
        let path = temp_file(
            "changes.geojson",
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                 "properties": {"OBJECT": "N", "OPERATION": "A", "X": 1.0, "Y": 2.0}},
                {"type": "Feature", "geometry": null,
                 "properties": {"OPERATION": "D", "A": 1, "B": 10001}}
            ]}"#,
        );
        let table = read_geojson_changes(&path).unwrap();
        assert_eq!(table.records[0].object, ObjectKind::Node);
        assert_eq!(table.records[0].get("model_node_id"), Some(&json!(0)));
        assert_eq!(table.records[1].operation, Operation::Delete);
    }
}
