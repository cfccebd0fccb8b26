//! Project cards: a named, documented set of network changes stored as YAML.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LassoError, Result};
use crate::transit::changes::{
    DELETE_TRANSIT_SERVICE, NEW_TRANSIT_SERVICE, PropertyChange, TransitChange, TransitServiceChange,
    TransitServiceDeletion, UPDATE_TRANSIT_SERVICE,
};

pub const DEFAULT_PROJECT_NAME: &str = "USER TO define";

pub const ROADWAY_PROPERTY_CHANGE: &str = "Roadway Property Change";
pub const ROADWAY_DELETION: &str = "Roadway Deletion";
pub const ADD_NEW_ROADWAY: &str = "Add New Roadway";

/// `{field: value}` or `{field: [values]}`; any listed value matches.
pub type Selector = Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.prerequisites.is_empty() && self.corequisites.is_empty() && self.conflicts.is_empty()
    }
}

/// Links a roadway change applies to. Every criterion must match.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadwayFacility {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<Selector>,
    #[serde(rename = "A", default, skip_serializing_if = "Option::is_none")]
    pub a: Option<Selector>,
    #[serde(rename = "B", default, skip_serializing_if = "Option::is_none")]
    pub b: Option<Selector>,
}

impl RoadwayFacility {
    pub fn for_links(model_link_ids: Vec<Value>) -> Self {
        let mut selector = Selector::new();
        selector.insert("model_link_id".to_string(), Value::Array(model_link_ids));
        Self {
            link: vec![selector],
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadwayPropertyChange {
    pub facility: RoadwayFacility,
    #[serde(default)]
    pub properties: Vec<PropertyChange>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadwayDeletion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Selector>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AddNewRoadway {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Map<String, Value>>,
}

/// One change in a card, tagged by its `category`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum Change {
    #[serde(rename = "Roadway Property Change")]
    RoadwayProperty(RoadwayPropertyChange),
    #[serde(rename = "Roadway Deletion")]
    RoadwayDeletion(RoadwayDeletion),
    #[serde(rename = "Add New Roadway")]
    AddNewRoadway(AddNewRoadway),
    #[serde(rename = "Transit Service Property Change", alias = "Update Transit Service")]
    TransitUpdate(TransitServiceChange),
    #[serde(rename = "Delete Transit Service")]
    TransitDelete(TransitServiceDeletion),
    #[serde(rename = "New Transit Service")]
    TransitAdd(TransitServiceChange),
}

impl Change {
    pub fn category(&self) -> &'static str {
        match self {
            Self::RoadwayProperty(_) => ROADWAY_PROPERTY_CHANGE,
            Self::RoadwayDeletion(_) => ROADWAY_DELETION,
            Self::AddNewRoadway(_) => ADD_NEW_ROADWAY,
            Self::TransitUpdate(_) => UPDATE_TRANSIT_SERVICE,
            Self::TransitDelete(_) => DELETE_TRANSIT_SERVICE,
            Self::TransitAdd(_) => NEW_TRANSIT_SERVICE,
        }
    }

    pub fn is_transit(&self) -> bool {
        matches!(self, Self::TransitUpdate(_) | Self::TransitDelete(_) | Self::TransitAdd(_))
    }

    pub fn to_transit(&self) -> Option<TransitChange> {
        match self {
            Self::TransitUpdate(change) => Some(TransitChange::Update(change.clone())),
            Self::TransitDelete(deletion) => Some(TransitChange::Delete(deletion.clone())),
            Self::TransitAdd(change) => Some(TransitChange::Add(change.clone())),
            _ => None,
        }
    }
}

impl From<TransitChange> for Change {
    fn from(change: TransitChange) -> Self {
        match change {
            TransitChange::Update(change) => Self::TransitUpdate(change),
            TransitChange::Delete(deletion) => Self::TransitDelete(deletion),
            TransitChange::Add(change) => Self::TransitAdd(change),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectCard {
    pub project: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Dependencies::is_empty")]
    pub dependencies: Dependencies,
    #[serde(default)]
    pub changes: Vec<Change>,
}

impl Default for ProjectCard {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_NAME)
    }
}

impl ProjectCard {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            tags: Vec::new(),
            dependencies: Dependencies::default(),
            changes: Vec::new(),
        }
    }

    /// Parse a card. A card holding a single change may carry its
    /// `category` and fields at the top level instead of under `changes`.
    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let mut document: serde_yaml::Mapping = serde_yaml::from_str(text)?;
        if document.contains_key("category") && !document.contains_key("changes") {
            let mut change = serde_yaml::Mapping::new();
            let keys: Vec<serde_yaml::Value> = document
                .keys()
                .filter(|k| !matches!(k.as_str(), Some("project" | "tags" | "dependencies")))
                .cloned()
                .collect();
            for key in keys {
                if let Some(value) = document.remove(&key) {
                    change.insert(key, value);
                }
            }
            document.insert(
                "changes".into(),
                serde_yaml::Value::Sequence(vec![serde_yaml::Value::Mapping(change)]),
            );
        }
        serde_yaml::from_value(serde_yaml::Value::Mapping(document))
    }

    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| LassoError::io(path, e))?;
        let card = Self::from_yaml(&text).map_err(|e| LassoError::yaml(path, e))?;
        info!("Read project card '{}' with {} changes", card.project, card.changes.len());
        Ok(card)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml().map_err(|e| LassoError::yaml(path, e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| LassoError::io(parent, e))?;
        }
        fs::write(path, yaml).map_err(|e| LassoError::io(path, e))?;
        info!("Wrote project card to {}", path.display());
        Ok(())
    }

    pub fn count_by_category(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        for change in &self.changes {
            match counts.iter_mut().find(|(category, _)| *category == change.category()) {
                Some((_, n)) => *n += 1,
                None => counts.push((change.category(), 1)),
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CARD: &str = r#"
project: Highland Ave lane reduction
tags: [roadway]
dependencies:
  prerequisites: [Base year fixes]
changes:
  - category: Roadway Property Change
    facility:
      link:
        - model_link_id: [1, 2]
    properties:
      - property: lanes
        existing: 2
        set: 1
  - category: Update Transit Service
    facility:
      route_id: 452-111
      direction_id: 1
      start_time: "06:00"
      end_time: "09:00"
    properties:
      - property: headway_secs
        set: 900
"#;

    #[test]
    fn test_read_multi_change_card() {
        let card = ProjectCard::from_yaml(CARD).unwrap();
        assert_eq!(card.project, "Highland Ave lane reduction");
        assert_eq!(card.dependencies.prerequisites, vec!["Base year fixes"]);
        assert_eq!(card.changes.len(), 2);

        let Change::RoadwayProperty(change) = &card.changes[0] else {
            panic!("expected a roadway property change");
        };
        assert_eq!(change.facility.link[0]["model_link_id"], json!([1, 2]));
        assert_eq!(change.properties[0], PropertyChange::set("lanes", 1).with_existing(2));
        assert!(card.changes[1].is_transit());
        assert_eq!(card.changes[1].category(), UPDATE_TRANSIT_SERVICE);
    }

    #[test]
    fn test_single_change_card_at_top_level() {
        let card = ProjectCard::from_yaml(
            r#"
project: Remove link
category: Roadway Deletion
links:
  model_link_id: [7]
"#,
        )
        .unwrap();
        assert_eq!(card.changes.len(), 1);
        assert_eq!(card.changes[0].category(), ROADWAY_DELETION);
    }

    #[test]
    fn test_written_card_reads_back() {
        let card = ProjectCard::from_yaml(CARD).unwrap();
        let yaml = card.to_yaml().unwrap();
        assert!(yaml.contains("category: Transit Service Property Change"));
        assert_eq!(ProjectCard::from_yaml(&yaml).unwrap(), card);
    }

    #[test]
    fn test_default_name() {
        assert_eq!(ProjectCard::default().project, DEFAULT_PROJECT_NAME);
        let card = ProjectCard::from_yaml(CARD).unwrap();
        assert_eq!(
            card.count_by_category(),
            vec![(ROADWAY_PROPERTY_CHANGE, 1), (UPDATE_TRANSIT_SERVICE, 1)]
        );
    }
}
