//! Conversion between a standard feed and Cube lines.
//!
//! Each frequency row becomes one line. The reverse writes one route, trip,
//! shape and frequency set per line.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use itertools::Itertools;
use log::{debug, info};
use serde_json::Value;

use crate::cube::CubeTransit;
use crate::models::line::Line;
use crate::models::time_period::{feed_time_to_secs, secs_to_feed_time};
use crate::models::types::{number_value, value_as_f64, value_to_string, Result, TransitError};
use crate::naming::RouteName;
use crate::parameters::TransitParameters;
use crate::standard::{
    FrequencyRecord, RouteRecord, ShapeRecord, StandardTransit, StopRecord, StopTimeRecord, TripRecord,
};

impl StandardTransit {
    pub fn to_cube_transit(&self, params: &TransitParameters) -> Result<CubeTransit> {
        let stop_nodes: HashMap<&str, &str> = self
            .stops
            .iter()
            .map(|s| (s.stop_id.as_str(), s.model_node_id.as_str()))
            .collect();

        let mut transit = CubeTransit::new();
        for frequency in &self.frequencies {
            let line = self.frequency_to_line(frequency, &stop_nodes, params)?;
            debug!("Converted trip {} to line {}", frequency.trip_id, line.name);
            transit.add_line(line)?;
        }
        info!("Converted {} frequencies to Cube lines", transit.len());
        Ok(transit)
    }

    pub fn write_as_cube_lin(&self, path: &Path, params: &TransitParameters) -> Result<()> {
        self.to_cube_transit(params)?.write_as_cube_lin(path)
    }

    fn frequency_to_line(
        &self,
        frequency: &FrequencyRecord,
        stop_nodes: &HashMap<&str, &str>,
        params: &TransitParameters,
    ) -> Result<Line> {
        let trip = self.trip(&frequency.trip_id).ok_or_else(|| {
            TransitError::InvalidData(format!("frequency references unknown trip {}", frequency.trip_id))
        })?;
        let route = self.route(&trip.route_id).ok_or_else(|| {
            TransitError::InvalidData(format!("trip {} references unknown route {}", trip.trip_id, trip.route_id))
        })?;

        let start = feed_time_to_secs(&frequency.start_time)?;
        let period = params
            .time_periods
            .period_for_time(start)
            .ok_or_else(|| TransitError::UnknownTimePeriod(frequency.start_time.clone()))?;
        let number = params.transit_period_number(period)?;
        let token = params.demand_abbreviation(period)?;

        let agency = non_empty(&route.agency_id, "0");
        let direction = non_empty(&trip.direction_id, "0");
        let name = RouteName::new(route.route_id.as_str(), token, agency, direction).line_name();

        let mode = params
            .mode_crosswalk
            .get(&route.route_type)
            .map(|m| Value::from(*m))
            .or_else(|| route.route_type.parse::<i64>().ok().map(Value::from))
            .unwrap_or_else(|| Value::from(route.route_type.clone()));

        let mut line = Line::new(name)
            .with_property("LONGNAME", route.route_long_name.as_str())
            .with_property(&format!("HEADWAY[{number}]"), number_value(frequency.headway_secs / 60.0))
            .with_property("MODE", mode)
            .with_property("ONEWAY", "T");
        if let Some(operator) = params.operator_crosswalk.get(&route.agency_id) {
            line = line.with_property("OPERATOR", *operator);
        }

        let trip_stops: HashSet<&str> = self
            .stop_times
            .iter()
            .filter(|st| st.trip_id == trip.trip_id)
            .filter_map(|st| stop_nodes.get(st.stop_id.as_str()).copied())
            .collect();

        let routing = self
            .shapes
            .iter()
            .filter(|pt| pt.shape_id == trip.shape_id)
            .sorted_by_key(|pt| pt.shape_pt_sequence)
            .map(|pt| {
                let id: i64 = pt.shape_model_node_id.trim().parse().map_err(|_| {
                    TransitError::InvalidData(format!(
                        "shape {} has invalid model node id '{}'",
                        pt.shape_id, pt.shape_model_node_id
                    ))
                })?;
                let is_stop = trip_stops.contains(pt.shape_model_node_id.trim());
                Ok(if is_stop { id } else { -id })
            })
            .collect::<Result<Vec<i64>>>()?;
        if routing.is_empty() {
            return Err(TransitError::InvalidData(format!(
                "trip {} has no shape points for shape '{}'",
                trip.trip_id, trip.shape_id
            )));
        }
        line.set_routing(&routing);
        Ok(line)
    }

    /// Feed with one route (shared per route id), trip, shape and set of
    /// frequencies per line.
    pub fn from_cube_transit(transit: &CubeTransit, params: &TransitParameters) -> Result<Self> {
        let mut feed = Self::default();
        let mut seen_routes = HashSet::new();
        let mut seen_stops = HashSet::new();

        for line in transit.lines() {
            let route = RouteName::parse(line.name.as_str())?;
            let trip_id = line.name.to_string();

            if seen_routes.insert(route.route_id.clone()) {
                feed.routes.push(RouteRecord {
                    route_id: route.route_id.to_string(),
                    agency_id: route.agency_id.to_string(),
                    route_short_name: route.short_name().to_string(),
                    route_long_name: line.properties.get("LONGNAME").map(value_to_string).unwrap_or_default(),
                    route_type: route_type(line, params),
                });
            }

            feed.trips.push(TripRecord {
                route_id: route.route_id.to_string(),
                service_id: String::new(),
                trip_id: trip_id.clone(),
                direction_id: route.direction_id.clone(),
                shape_id: trip_id.clone(),
            });

            for number in line.time_period_numbers() {
                let Some(minutes) = params
                    .properties_for_period(&number)
                    .iter()
                    .find_map(|key| line.properties.get(key).and_then(value_as_f64))
                else {
                    continue;
                };
                let span = params.time_periods.span(params.network_period(&number)?)?;
                let (start, end) = span.minutes();
                feed.frequencies.push(FrequencyRecord {
                    trip_id: trip_id.clone(),
                    start_time: secs_to_feed_time(start * 60),
                    end_time: secs_to_feed_time(end * 60),
                    headway_secs: minutes * 60.0,
                });
            }

            let mut stop_sequence = 0;
            for (i, node) in line.nodes.iter().enumerate() {
                let node_id = node.id.to_string();
                feed.shapes.push(ShapeRecord {
                    shape_id: trip_id.clone(),
                    shape_pt_sequence: i as u32 + 1,
                    shape_model_node_id: node_id.clone(),
                    ..Default::default()
                });
                if !node.stop {
                    continue;
                }
                if seen_stops.insert(node.id) {
                    feed.stops.push(StopRecord {
                        stop_id: node_id.clone(),
                        model_node_id: node_id.clone(),
                        ..Default::default()
                    });
                }
                stop_sequence += 1;
                feed.stop_times.push(StopTimeRecord {
                    trip_id: trip_id.clone(),
                    stop_id: node_id,
                    stop_sequence,
                    ..Default::default()
                });
            }
        }

        info!("Converted {} Cube lines to a standard feed", transit.len());
        Ok(feed)
    }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// `route_type` for a line's `MODE`, through the mode crosswalk in reverse.
fn route_type(line: &Line, params: &TransitParameters) -> String {
    let Some(mode) = line.properties.get("MODE") else {
        return String::new();
    };
    let mode_number = value_as_f64(mode).map(|m| m as i64);
    params
        .mode_crosswalk
        .iter()
        .find(|(_, m)| Some(**m) == mode_number)
        .map(|(route_type, _)| route_type.clone())
        .unwrap_or_else(|| value_to_string(mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> StandardTransit {
        StandardTransit {
            routes: vec![RouteRecord {
                route_id: "452-111".into(),
                agency_id: "0".into(),
                route_short_name: "452".into(),
                route_long_name: "Ltd Stop - Highland".into(),
                route_type: "3".into(),
            }],
            trips: vec![TripRecord {
                route_id: "452-111".into(),
                trip_id: "t1".into(),
                direction_id: "1".into(),
                shape_id: "s1".into(),
                ..Default::default()
            }],
            frequencies: vec![
                FrequencyRecord {
                    trip_id: "t1".into(),
                    start_time: "06:00:00".into(),
                    end_time: "09:00:00".into(),
                    headway_secs: 600.0,
                },
                FrequencyRecord {
                    trip_id: "t1".into(),
                    start_time: "09:00:00".into(),
                    end_time: "16:00:00".into(),
                    headway_secs: 1200.0,
                },
            ],
            stops: vec![
                StopRecord {
                    stop_id: "a".into(),
                    model_node_id: "39249".into(),
                    ..Default::default()
                },
                StopRecord {
                    stop_id: "b".into(),
                    model_node_id: "54648".into(),
                    ..Default::default()
                },
            ],
            shapes: [(3, "54648"), (1, "39249"), (2, "39240")]
                .into_iter()
                .map(|(seq, node)| ShapeRecord {
                    shape_id: "s1".into(),
                    shape_pt_sequence: seq,
                    shape_model_node_id: node.into(),
                    ..Default::default()
                })
                .collect(),
            stop_times: vec![
                StopTimeRecord {
                    trip_id: "t1".into(),
                    stop_id: "a".into(),
                    stop_sequence: 1,
                    ..Default::default()
                },
                StopTimeRecord {
                    trip_id: "t1".into(),
                    stop_id: "b".into(),
                    stop_sequence: 2,
                    ..Default::default()
                },
            ],
        }
    }

    fn params() -> TransitParameters {
        let mut params = TransitParameters::default();
        params.mode_crosswalk.insert("3".to_string(), 5);
        params
    }

    #[test]
    fn test_frequencies_become_lines() {
        let transit = feed().to_cube_transit(&params()).unwrap();
        let names: Vec<&str> = transit.line_names().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["0_452-111_452_pk1", "0_452-111_452_op1"]);

        let peak = transit.line("0_452-111_452_pk1").unwrap();
        assert_eq!(peak.signed_nodes(), vec![39249, -39240, 54648]);
        assert_eq!(peak.properties.get("HEADWAY[1]"), Some(&Value::from(10)));
        assert_eq!(peak.properties.get("MODE"), Some(&Value::from(5)));
        assert_eq!(peak.properties.get("ONEWAY"), Some(&Value::from("T")));
        assert!(peak.properties.get("OPERATOR").is_none());

        let offpeak = transit.line("0_452-111_452_op1").unwrap();
        assert_eq!(offpeak.properties.get("HEADWAY[2]"), Some(&Value::from(20)));
    }

    #[test]
    fn test_written_line_file_parses_back() {
        let text = feed().to_cube_transit(&params()).unwrap().to_line_file_string();
        let reread = CubeTransit::from_source(&text).unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(
            reread.line("0_452-111_452_pk1").unwrap().properties.get("LONGNAME"),
            Some(&Value::from("Ltd Stop - Highland"))
        );
    }

    #[test]
    fn test_lines_become_feed() {
        let params = params();
        let transit = feed().to_cube_transit(&params).unwrap();
        let back = StandardTransit::from_cube_transit(&transit, &params).unwrap();

        assert_eq!(back.routes.len(), 1);
        assert_eq!(back.routes[0].route_type, "3");
        assert_eq!(back.trips.len(), 2);
        assert_eq!(back.frequencies[0].start_time, "06:00:00");
        assert_eq!(back.frequencies[0].end_time, "09:00:00");
        assert_eq!(back.frequencies[0].headway_secs, 600.0);
        assert_eq!(back.stops.len(), 2);
        let stops: Vec<&str> = back
            .stop_times
            .iter()
            .filter(|st| st.trip_id == "0_452-111_452_pk1")
            .map(|st| st.stop_id.as_str())
            .collect();
        assert_eq!(stops, vec!["39249", "54648"]);
    }

    #[test]
    fn test_unknown_trip_is_an_error() {
        let mut feed = feed();
        feed.frequencies[0].trip_id = "nope".into();
        assert!(feed.to_cube_transit(&params()).is_err());
    }
}
