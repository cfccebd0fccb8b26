use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use lasso_core::card::{Change, ProjectCard};
use lasso_core::prelude::*;
use lasso_core::transit::PropertyChange;
use serde_json::{Value, json};

const BASE_LINES: &str = r#";;<<PT>><<LINE>>;;
LINE NAME="0_452-111_452_pk1", MODE=5, HEADWAY[1]=10, NODES= 39249, -39240, 54648
LINE NAME="0_134-111_134_op0", MODE=5, HEADWAY[2]=30, NODES= 54648, 39249
"#;

const BUILD_LINES: &str = r#";;<<PT>><<LINE>>;;
LINE NAME="0_452-111_452_pk1", MODE=5, HEADWAY[1]=15, NODES= 39249, -39240, 54648
LINE NAME="0_134-111_134_op0", MODE=5, HEADWAY[2]=30, NODES= 54648, 39249
"#;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lasso-workflow-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Three links between four nodes; node 1 is a zone centroid.
fn write_base_network(dir: &PathBuf) {
    let links = json!([
        {"model_link_id": 1, "A": 1, "B": 10001, "lanes": 1, "name": "connector", "drive_access": 1},
        {"model_link_id": 2, "A": 10001, "B": 10002, "lanes": 2, "name": "Highland Ave", "drive_access": 1},
        {"model_link_id": 3, "A": 10002, "B": 10003, "lanes": 2, "name": "Highland Ave", "drive_access": 1}
    ]);
    fs::write(dir.join("link.json"), links.to_string()).unwrap();

    let features: Vec<Value> = [(1, 0.0), (10001, 1.0), (10002, 2.0), (10003, 3.0)]
        .into_iter()
        .map(|(id, x)| {
            json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [x, 0.0]},
                "properties": {"model_node_id": id, "drive_node": 1}
            })
        })
        .collect();
    let nodes = json!({"type": "FeatureCollection", "features": features});
    fs::write(dir.join("node.geojson"), nodes.to_string()).unwrap();
}

#[test]
fn test_log_file_to_card_to_scenario() {
    let dir = scratch("log");
    let network_dir = dir.join("base");
    fs::create_dir_all(&network_dir).unwrap();
    write_base_network(&network_dir);

    let log = dir.join("highland_lanes.log");
    fs::write(&log, "L;A;B;LANES\nL;C;1;10001;10002;3\nL;C;1;10002;10003;3\n").unwrap();

    let project = ProjectBuilder::new()
        .base_roadway_dir(&network_dir)
        .roadway_log_files(vec![log])
        .build()
        .unwrap();
    assert_eq!(project.project_name, "highland_lanes");

    let card = project.card();
    assert_eq!(card.changes.len(), 1);
    let Change::RoadwayProperty(change) = &card.changes[0] else {
        panic!("expected a roadway property change");
    };
    assert_eq!(change.facility.link[0]["model_link_id"], json!([2, 3]));
    assert_eq!(change.properties, vec![PropertyChange::set("lanes", 3).with_existing(2)]);

    let card_path = project.write_project_card(Some(&dir.join("cards/highland.yml"))).unwrap();
    let reread = ProjectCard::read(&card_path).unwrap();
    assert_eq!(&reread, card);

    let mut scenario = Scenario::new(
        BaseNetworks {
            roadway: RoadwayNetwork::read_dir(&network_dir).unwrap(),
            transit: None,
        },
        Parameters::default(),
    );
    assert_eq!(scenario.add_project_cards_from_dir(&dir.join("cards")).unwrap(), 1);
    scenario.apply_all_projects().unwrap();

    let lanes: Vec<_> = scenario.roadway.links.iter().map(|l| l.get("lanes").cloned()).collect();
    assert_eq!(lanes, vec![Some(json!(1)), Some(json!(3)), Some(json!(3))]);
    let summary = scenario.summary();
    assert_eq!(summary.applied_projects, vec!["highland_lanes"]);
    assert!(summary.overlaps.is_empty());
}

#[test]
fn test_csv_changes_add_and_delete() {
    let dir = scratch("csv");
    let network_dir = dir.join("base");
    fs::create_dir_all(&network_dir).unwrap();
    write_base_network(&network_dir);

    let csv = dir.join("changes.csv");
    fs::write(
        &csv,
        "OBJECT,OPERATION,model_link_id,A,B,lanes,X,Y\n\
         L,D,3,10002,10003,,,\n\
         N,A,,,,,4.0,0.0\n\
         L,A,4,10002,20000,1,,\n",
    )
    .unwrap();

    let project = ProjectBuilder::new()
        .project_name("Rebuild east end")
        .base_roadway_dir(&network_dir)
        .roadway_csv_file(&csv)
        .build()
        .unwrap();

    let categories: Vec<_> = project.card().changes.iter().map(Change::category).collect();
    assert_eq!(categories, vec!["Roadway Deletion", "Add New Roadway"]);
    assert_eq!(project.default_card_file_name(), "Rebuild_east_end.yml");
}

#[test]
fn test_transit_card_applies_onto_base_lines() {
    let project = ProjectBuilder::new()
        .project_name("Route 452 frequency")
        .base_transit_source(BASE_LINES)
        .build_transit_source(BUILD_LINES)
        .build()
        .unwrap();
    let card = project.card();
    assert_eq!(card.changes.len(), 1);
    assert_eq!(card.changes[0].category(), "Transit Service Property Change");

    let yaml = card.to_yaml().unwrap();
    let reread = ProjectCard::from_yaml(&yaml).unwrap();

    let mut scenario = Scenario::new(
        BaseNetworks {
            roadway: RoadwayNetwork::default(),
            transit: Some(CubeTransit::from_source(BASE_LINES).unwrap()),
        },
        Parameters::default(),
    );
    scenario.add_project_card(reread).unwrap();
    scenario.apply_all_projects().unwrap();

    let transit = scenario.transit.as_ref().unwrap();
    let line = transit.line("0_452-111_452_pk1").unwrap();
    assert_eq!(line.properties.get("HEADWAY[1]"), Some(&json!(15)));
    assert_eq!(scenario.summary().transit_lines, Some(2));
}

#[test]
fn test_transit_card_without_transit_network() {
    let project = ProjectBuilder::new()
        .base_transit_source(BASE_LINES)
        .build_transit_source(BUILD_LINES)
        .build()
        .unwrap();

    let mut scenario = Scenario::new(
        BaseNetworks {
            roadway: RoadwayNetwork::default(),
            transit: None,
        },
        Parameters::default(),
    );
    scenario.add_project_card(project.card().clone()).unwrap();
    let err = scenario.apply_all_projects().unwrap_err();
    assert!(matches!(err, LassoError::Scenario(_)));
}

#[test]
fn test_model_exports_from_base_network() {
    let dir = scratch("model");
    let network_dir = dir.join("base");
    fs::create_dir_all(&network_dir).unwrap();
    write_base_network(&network_dir);

    let mut model = ModelRoadwayNetwork::read_dir(&network_dir, Parameters::default()).unwrap();
    let x = model.network.nodes[1].get("X").and_then(Value::as_f64).unwrap();
    assert_relative_eq!(x, 1.0);
    model.roadway_standard_to_model().unwrap();
    let out = dir.join("out");
    model.write_roadway_as_fixedwidth(&out, true).unwrap();
    model.write_roadway_as_csv(&out).unwrap();
    model.write_roadway_as_geojson(&out).unwrap();

    let links = fs::read_to_string(out.join("links.txt")).unwrap();
    assert_eq!(links.lines().count(), 3);
    let widths = fs::read_to_string(out.join("links_header_width.txt")).unwrap();
    assert!(widths.starts_with("header,width\nmodel_link_id,1\n"));
    assert!(fs::read_to_string(out.join("links.csv")).unwrap().contains("centroidconnect"));
}

#[test]
fn test_routing_extension_card_applies_twice() {
    let base = r#"LINE NAME="0_7-1_7_pk1", MODE=5, HEADWAY[1]=10, NODES=39249, 39250, 39251, 39252"#;
    let build = r#"LINE NAME="0_7-1_7_pk1", MODE=5, HEADWAY[1]=10, NODES=39249, 39250, 39251, 39252, 39253, -39254, 39255"#;
    let project = ProjectBuilder::new()
        .project_name("Extend route 7")
        .base_transit_source(base)
        .build_transit_source(build)
        .build()
        .unwrap();
    let card = ProjectCard::from_yaml(&project.card().to_yaml().unwrap()).unwrap();
    assert_eq!(card.changes.len(), 1);

    let mut scenario = Scenario::new(
        BaseNetworks {
            roadway: RoadwayNetwork::default(),
            transit: Some(CubeTransit::from_source(base).unwrap()),
        },
        Parameters::default(),
    );
    scenario.add_project_card(card.clone()).unwrap();
    scenario.apply_all_projects().unwrap();

    // The routing change's `existing` run is part of its `set` run, so it
    // still matches the extended line.
    let change = card.changes[0].to_transit().unwrap();
    let transit = scenario.transit.as_mut().unwrap();
    transit.apply_change(&change, &Parameters::default().transit).unwrap();
    let line = transit.line("0_7-1_7_pk1").unwrap();
    assert_eq!(line.signed_nodes(), vec![39249, 39250, 39251, 39252, 39253, -39254, 39255]);
}

#[test]
fn test_time_of_day_card_reproduces_change_table() {
    let dir = scratch("timeofday");
    let network_dir = dir.join("base");
    fs::create_dir_all(&network_dir).unwrap();
    write_base_network(&network_dir);
    let links = json!([
        {"model_link_id": 1, "A": 1, "B": 10001, "lanes": 1, "lanes_AM": 1, "name": "connector", "drive_access": 1},
        {"model_link_id": 2, "A": 10001, "B": 10002, "lanes": 2, "lanes_AM": 2, "name": "Highland Ave", "drive_access": 1},
        {"model_link_id": 3, "A": 10002, "B": 10003, "lanes": 2, "lanes_AM": 2, "name": "Highland Ave", "drive_access": 1}
    ]);
    fs::write(network_dir.join("link.json"), links.to_string()).unwrap();

    let log = dir.join("am_peak_lane.log");
    fs::write(&log, "L;A;B;LANES_AM\nL;C;1;10001;10002;3\n").unwrap();
    let project = ProjectBuilder::new()
        .base_roadway_dir(&network_dir)
        .roadway_log_files(vec![log])
        .build()
        .unwrap();
    let Change::RoadwayProperty(change) = &project.card().changes[0] else {
        panic!("expected a roadway property change");
    };
    assert_eq!(change.properties[0].property, "lanes");
    assert!(change.properties[0].timeofday.is_some());

    let mut scenario = Scenario::new(
        BaseNetworks {
            roadway: RoadwayNetwork::read_dir(&network_dir).unwrap(),
            transit: None,
        },
        Parameters::default(),
    );
    let card = ProjectCard::from_yaml(&project.card().to_yaml().unwrap()).unwrap();
    scenario.add_project_card(card).unwrap();
    scenario.apply_all_projects().unwrap();

    let mut model = ModelRoadwayNetwork::new(scenario.roadway.clone(), Parameters::default());
    model.roadway_standard_to_model().unwrap();
    let changed = &model.network.links[1];
    assert_eq!(changed.get("lanes_AM"), Some(&json!(3)));
    assert_eq!(changed.get("lanes_PM"), Some(&json!(2)));
    assert_eq!(model.network.links[2].get("lanes_AM"), Some(&json!(2)));
}

#[test]
fn test_failed_card_leaves_roadway_unchanged() {
    let dir = scratch("atomic");
    write_base_network(&dir);
    let base = RoadwayNetwork::read_dir(&dir).unwrap();

    let card = ProjectCard::from_yaml(
        r#"
project: east extension
category: Add New Roadway
links:
  - {model_link_id: 4, A: 10003, B: 20000}
  - {model_link_id: 2, A: 20000, B: 10003}
nodes:
  - {model_node_id: 20000, X: 4.0, Y: 0.0}
"#,
    )
    .unwrap();
    let mut scenario = Scenario::new(
        BaseNetworks {
            roadway: base.clone(),
            transit: None,
        },
        Parameters::default(),
    );
    scenario.add_project_card(card).unwrap();
    assert!(scenario.apply_all_projects().is_err());
    assert_eq!(scenario.roadway, base);
    assert!(scenario.summary().applied_projects.is_empty());
}
