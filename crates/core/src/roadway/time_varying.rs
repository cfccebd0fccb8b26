//! Link attributes that vary by time of day and user category.
//!
//! Stored on a link as `{"default": v, "timeofday": [{"time": [s, e],
//! "category": c, "value": v}]}`; any other value is a plain attribute.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transit::models::time_period::TimeSpan;

/// Category name meaning "the value without a category".
pub const DEFAULT_CATEGORY: &str = "default";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDayValue {
    pub time: TimeSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub value: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeVaryingValue {
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub timeofday: Vec<TimeOfDayValue>,
}

impl TimeVaryingValue {
    /// Parse a time-varying attribute; `None` for plain values.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if !object.contains_key("timeofday") {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Wrap a plain value so time-of-day entries can be added to it.
    pub fn from_default(default: Value) -> Self {
        Self {
            default,
            timeofday: Vec::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn get(&self, time: &TimeSpan, category: Option<&str>) -> Option<&Value> {
        self.timeofday
            .iter()
            .find(|entry| entry.time == *time && entry.category.as_deref() == category)
            .map(|entry| &entry.value)
    }

    /// Set the value for a time and category, replacing an entry with the
    /// same key.
    pub fn set(&mut self, time: TimeSpan, category: Option<String>, value: Value) {
        match self
            .timeofday
            .iter_mut()
            .find(|entry| entry.time == time && entry.category == category)
        {
            Some(entry) => entry.value = value,
            None => self.timeofday.push(TimeOfDayValue { time, category, value }),
        }
    }

    /// Value in effect during `period`.
    ///
    /// With a category lookup, the first category with an entry overlapping
    /// the period wins; `default` stands for the uncategorised entries and
    /// then the default value.
    pub fn value_for(&self, period: &TimeSpan, lookup: Option<&[String]>) -> Value {
        let entry_for = |category: Option<&str>| {
            self.timeofday
                .iter()
                .find(|entry| entry.category.as_deref() == category && entry.time.overlaps(period))
                .map(|entry| entry.value.clone())
        };

        let Some(lookup) = lookup else {
            return entry_for(None).unwrap_or_else(|| self.default.clone());
        };
        for category in lookup {
            if category == DEFAULT_CATEGORY {
                return entry_for(None).unwrap_or_else(|| self.default.clone());
            }
            if let Some(value) = entry_for(Some(category.as_str())) {
                return value;
            }
        }
        self.default.clone()
    }
}

/// Value of a plain or time-varying attribute during `period`.
pub fn value_for_period(value: &Value, period: &TimeSpan, lookup: Option<&[String]>) -> Value {
    match TimeVaryingValue::from_value(value) {
        Some(varying) => varying.value_for(period, lookup),
        None => value.clone(),
    }
}
