//! Change records in project-card form.
//!
//! [`PropertyChange`] is shared with roadway cards; the transit-specific
//! records select service by route, direction and time window.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::identifiers::{AgencyIdentifier, RouteIdentifier};
use crate::models::time_period::TimeSpan;
use crate::models::types::Result;

pub const UPDATE_TRANSIT_SERVICE: &str = "Transit Service Property Change";
pub const DELETE_TRANSIT_SERVICE: &str = "Delete Transit Service";
pub const NEW_TRANSIT_SERVICE: &str = "New Transit Service";

/// Keep an explicit `null` as `Some(Value::Null)` so it can mean "remove".
fn explicit_value<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// One property edit: `set` replaces, `change` adds, `existing` is checked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub property: String,
    #[serde(default, deserialize_with = "explicit_value", skip_serializing_if = "Option::is_none")]
    pub existing: Option<Value>,
    #[serde(default, deserialize_with = "explicit_value", skip_serializing_if = "Option::is_none")]
    pub set: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeofday: Option<Vec<TimeOfDayChange>>,
}

impl PropertyChange {
    pub fn set(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            set: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_existing(mut self, value: impl Into<Value>) -> Self {
        self.existing = Some(value.into());
        self
    }
}

/// A property edit limited to one time window (and optionally one category).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDayChange {
    pub time: TimeSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "explicit_value", skip_serializing_if = "Option::is_none")]
    pub existing: Option<Value>,
    #[serde(default, deserialize_with = "explicit_value", skip_serializing_if = "Option::is_none")]
    pub set: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<Value>,
}

/// Selects transit service by route, direction and time window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitFacility {
    pub route_id: RouteIdentifier,
    pub direction_id: i64,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<AgencyIdentifier>,
}

impl TransitFacility {
    pub fn time_span(&self) -> Result<TimeSpan> {
        TimeSpan::parse(&self.start_time, &self.end_time)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitServiceChange {
    pub facility: TransitFacility,
    #[serde(default)]
    pub properties: Vec<PropertyChange>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitServiceDeletion {
    pub facility: TransitFacility,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum TransitChange {
    #[serde(rename = "Transit Service Property Change", alias = "Update Transit Service")]
    Update(TransitServiceChange),
    #[serde(rename = "Delete Transit Service")]
    Delete(TransitServiceDeletion),
    #[serde(rename = "New Transit Service")]
    Add(TransitServiceChange),
}

impl TransitChange {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Update(_) => UPDATE_TRANSIT_SERVICE,
            Self::Delete(_) => DELETE_TRANSIT_SERVICE,
            Self::Add(_) => NEW_TRANSIT_SERVICE,
        }
    }

    pub fn facility(&self) -> &TransitFacility {
        match self {
            Self::Update(change) | Self::Add(change) => &change.facility,
            Self::Delete(deletion) => &deletion.facility,
        }
    }

    pub fn properties(&self) -> &[PropertyChange] {
        match self {
            Self::Update(change) | Self::Add(change) => &change.properties,
            Self::Delete(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_null_is_kept() {
        let change: PropertyChange = serde_json::from_str(r#"{"property": "COLOR", "set": null}"#).unwrap();
        assert_eq!(change.set, Some(Value::Null));

        let change: PropertyChange = serde_json::from_str(r#"{"property": "COLOR"}"#).unwrap();
        assert_eq!(change.set, None);
    }

    #[test]
    fn test_transit_change_category_tag() {
        let json = r#"{
            "category": "Update Transit Service",
            "facility": {"route_id": "452-111", "direction_id": 1, "start_time": "06:00", "end_time": "09:00"},
            "properties": [{"property": "headway_secs", "set": 900}]
        }"#;
        let change: TransitChange = serde_json::from_str(json).unwrap();
        assert_eq!(change.category(), UPDATE_TRANSIT_SERVICE);
        assert_eq!(change.properties()[0], PropertyChange::set("headway_secs", 900));

        let written = serde_json::to_value(&change).unwrap();
        assert_eq!(written["category"], Value::from(UPDATE_TRANSIT_SERVICE));
        assert!(written["facility"].get("agency_id").is_none());
    }
}
