//! CSV and GeoJSON exports of the model network's output variables.

use std::fs;
use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson};
use log::info;
use serde_json::{Map, Value};

use crate::error::{LassoError, Result};
use crate::model::ModelRoadwayNetwork;
use crate::roadway::feature;
use crate::transit::models::types::value_to_string;

fn write_csv<'a>(path: &Path, columns: &[String], records: impl Iterator<Item = &'a Map<String, Value>>) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| LassoError::csv(path, e))?;
    writer.write_record(columns).map_err(|e| LassoError::csv(path, e))?;
    let mut count = 0;
    for record in records {
        let row = columns
            .iter()
            .map(|column| record.get(column).map(value_to_string).unwrap_or_default());
        writer.write_record(row).map_err(|e| LassoError::csv(path, e))?;
        count += 1;
    }
    writer.flush().map_err(|e| LassoError::io(path, e))?;
    Ok(count)
}

fn select(properties: &Map<String, Value>, columns: &[String]) -> Map<String, Value> {
    columns
        .iter()
        .filter_map(|column| Some((column.clone(), properties.get(column)?.clone())))
        .collect()
}

fn write_geojson(path: &Path, features: Vec<Feature>) -> Result<()> {
    let collection = GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });
    fs::write(path, collection.to_string()).map_err(|e| LassoError::io(path, e))
}

impl ModelRoadwayNetwork {
    /// Write output variables to `links.csv` and `nodes.csv`. Geometry is
    /// not written.
    pub fn write_roadway_as_csv(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| LassoError::io(dir, e))?;
        let files = &self.params.output_files;

        let links = write_csv(
            &dir.join(&files.links_csv),
            &self.link_output_variables(),
            self.network.links.iter().map(|l| &l.properties),
        )?;
        let nodes = write_csv(
            &dir.join(&files.nodes_csv),
            &self.node_output_variables(),
            self.network.nodes.iter().map(|n| &n.properties),
        )?;
        info!("Wrote {links} links and {nodes} nodes as CSV to {}", dir.display());
        Ok(())
    }

    /// Write output variables with link and node geometry to
    /// `links.geojson` and `nodes.geojson`.
    pub fn write_roadway_as_geojson(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| LassoError::io(dir, e))?;
        let files = &self.params.output_files;

        let link_columns = self.link_output_variables();
        let link_features: Vec<Feature> = self
            .network
            .links
            .iter()
            .map(|link| {
                let geometry = self
                    .network
                    .link_geometry(link)
                    .map(|line| geojson::Value::from(&line));
                feature(geometry, &select(&link.properties, &link_columns))
            })
            .collect();

        let node_columns = self.node_output_variables();
        let node_features: Vec<Feature> = self
            .network
            .nodes
            .iter()
            .map(|node| {
                let geometry = node.point.as_ref().map(geojson::Value::from);
                feature(geometry, &select(&node.properties, &node_columns))
            })
            .collect();

        let (links, nodes) = (link_features.len(), node_features.len());
        write_geojson(&dir.join(&files.links_geojson), link_features)?;
        write_geojson(&dir.join(&files.nodes_geojson), node_features)?;
        info!("Wrote {links} links and {nodes} nodes as GeoJSON to {}", dir.display());
        Ok(())
    }
}
