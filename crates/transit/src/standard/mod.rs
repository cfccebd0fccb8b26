//! Standard frequency-based transit feed.
//!
//! A feed directory holds `routes.txt`, `trips.txt`, `frequencies.txt`,
//! `stops.txt`, `shapes.txt` and `stop_times.txt`. Stops and shape points
//! carry the model node they sit on (`model_node_id`, `shape_model_node_id`).
//! Identifiers are read as strings so leading zeros survive.

pub mod convert;

use std::fs;
use std::path::Path;

use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::types::{Result, TransitError};

pub const ROUTES_FILE: &str = "routes.txt";
pub const TRIPS_FILE: &str = "trips.txt";
pub const FREQUENCIES_FILE: &str = "frequencies.txt";
pub const STOPS_FILE: &str = "stops.txt";
pub const SHAPES_FILE: &str = "shapes.txt";
pub const STOP_TIMES_FILE: &str = "stop_times.txt";

// ============================================================================
// Records
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub route_id: String,
    #[serde(default)]
    pub agency_id: String,
    #[serde(default)]
    pub route_short_name: String,
    #[serde(default)]
    pub route_long_name: String,
    #[serde(default)]
    pub route_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub route_id: String,
    #[serde(default)]
    pub service_id: String,
    pub trip_id: String,
    #[serde(default)]
    pub direction_id: String,
    #[serde(default)]
    pub shape_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRecord {
    pub trip_id: String,
    pub start_time: String,
    pub end_time: String,
    pub headway_secs: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: String,
    #[serde(default)]
    pub stop_lat: Option<f64>,
    #[serde(default)]
    pub stop_lon: Option<f64>,
    #[serde(default)]
    pub model_node_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub shape_id: String,
    #[serde(default)]
    pub shape_pt_lat: Option<f64>,
    #[serde(default)]
    pub shape_pt_lon: Option<f64>,
    pub shape_pt_sequence: u32,
    pub shape_model_node_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StopTimeRecord {
    pub trip_id: String,
    #[serde(default)]
    pub arrival_time: String,
    #[serde(default)]
    pub departure_time: String,
    pub stop_id: String,
    pub stop_sequence: u32,
}

// ============================================================================
// Feed
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StandardTransit {
    pub routes: Vec<RouteRecord>,
    pub trips: Vec<TripRecord>,
    pub frequencies: Vec<FrequencyRecord>,
    pub stops: Vec<StopRecord>,
    pub shapes: Vec<ShapeRecord>,
    pub stop_times: Vec<StopTimeRecord>,
}

impl StandardTransit {
    /// Read every feed table from `dir`; a missing table is an error.
    pub fn read(dir: &Path) -> Result<Self> {
        info!("Reading standard transit feed from {}", dir.display());
        let feed = Self {
            routes: read_table(dir, ROUTES_FILE)?,
            trips: read_table(dir, TRIPS_FILE)?,
            frequencies: read_table(dir, FREQUENCIES_FILE)?,
            stops: read_table(dir, STOPS_FILE)?,
            shapes: read_table(dir, SHAPES_FILE)?,
            stop_times: read_table(dir, STOP_TIMES_FILE)?,
        };
        info!(
            "Feed has {} routes, {} trips, {} frequencies",
            feed.routes.len(),
            feed.trips.len(),
            feed.frequencies.len()
        );
        Ok(feed)
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| TransitError::io(dir, e))?;
        write_table(dir, ROUTES_FILE, &self.routes)?;
        write_table(dir, TRIPS_FILE, &self.trips)?;
        write_table(dir, FREQUENCIES_FILE, &self.frequencies)?;
        write_table(dir, STOPS_FILE, &self.stops)?;
        write_table(dir, SHAPES_FILE, &self.shapes)?;
        write_table(dir, STOP_TIMES_FILE, &self.stop_times)?;
        info!("Wrote standard transit feed to {}", dir.display());
        Ok(())
    }

    pub fn route(&self, route_id: &str) -> Option<&RouteRecord> {
        self.routes.iter().find(|r| r.route_id == route_id)
    }

    pub fn trip(&self, trip_id: &str) -> Option<&TripRecord> {
        self.trips.iter().find(|t| t.trip_id == trip_id)
    }
}

fn read_table<T: DeserializeOwned>(dir: &Path, file_name: &str) -> Result<Vec<T>> {
    let path = dir.join(file_name);
    if !path.is_file() {
        return Err(TransitError::InvalidData(format!(
            "Standard transit feed is missing {file_name} in {}",
            dir.display()
        )));
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .map_err(|e| TransitError::csv(&path, e))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| TransitError::csv(&path, e))
}

fn write_table<T: Serialize>(dir: &Path, file_name: &str, records: &[T]) -> Result<()> {
    let path = dir.join(file_name);
    let mut writer = csv::Writer::from_path(&path).map_err(|e| TransitError::csv(&path, e))?;
    for record in records {
        writer.serialize(record).map_err(|e| TransitError::csv(&path, e))?;
    }
    writer.flush().map_err(|e| TransitError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_names_the_file() {
        let dir = std::env::temp_dir().join(format!("lasso-feed-missing-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(ROUTES_FILE), "route_id,route_type\n452-111,3\n").unwrap();

        let err = StandardTransit::read(&dir).unwrap_err();
        assert!(err.to_string().contains(TRIPS_FILE));
    }

    #[test]
    fn test_read_keeps_leading_zeros() {
        let dir = std::env::temp_dir().join(format!("lasso-feed-zeros-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(ROUTES_FILE), "route_id,agency_id,route_type\n007,01,3\n").unwrap();
        fs::write(dir.join(TRIPS_FILE), "route_id,trip_id,direction_id,shape_id\n007,t1,0,s1\n").unwrap();
        fs::write(
            dir.join(FREQUENCIES_FILE),
            "trip_id,start_time,end_time,headway_secs\nt1,06:00:00,09:00:00,600\n",
        )
        .unwrap();
        fs::write(dir.join(STOPS_FILE), "stop_id,model_node_id\n1,100\n").unwrap();
        fs::write(
            dir.join(SHAPES_FILE),
            "shape_id,shape_pt_sequence,shape_model_node_id\ns1,1,100\ns1,2,101\n",
        )
        .unwrap();
        fs::write(dir.join(STOP_TIMES_FILE), "trip_id,stop_id,stop_sequence\nt1,1,1\n").unwrap();

        let feed = StandardTransit::read(&dir).unwrap();
        assert_eq!(feed.routes[0].route_id, "007");
        assert_eq!(feed.routes[0].agency_id, "01");
        assert_eq!(feed.frequencies[0].headway_secs, 600.0);
        assert_eq!(feed.shapes.len(), 2);
    }
}
