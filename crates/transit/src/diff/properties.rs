//! Line attribute differences and their card form.

use serde_json::{Map, Value};

use crate::changes::PropertyChange;
use crate::diff::DiffOptions;
use crate::models::types::{number_value, value_as_f64};
use crate::parameters::TransitParameters;

/// Card property carrying Cube `HEADWAY`/`FREQ` values, in seconds.
pub const HEADWAY_SECS: &str = "headway_secs";

fn minutes_to_secs(value: &Value) -> Value {
    value_as_f64(value)
        .map(|minutes| number_value(minutes * 60.0))
        .unwrap_or_else(|| value.clone())
}

/// Drop time-varying attributes that belong to other time periods.
pub fn properties_for_period(
    properties: &Map<String, Value>,
    period: &str,
    params: &TransitParameters,
) -> Map<String, Value> {
    let this_period = params.properties_for_period(period);
    let other_periods: Vec<String> = params
        .time_period_properties_list()
        .into_iter()
        .filter(|key| !this_period.contains(key))
        .collect();

    properties
        .iter()
        .filter(|(key, _)| !other_periods.contains(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Changes turning `base` attributes into `build` attributes for one period.
///
/// Compares the symmetric difference of (name, value) pairs; an attribute
/// only in base is emitted with `set: null`.
pub fn property_differences(
    build: &Map<String, Value>,
    base: &Map<String, Value>,
    period: &str,
    params: &TransitParameters,
    options: DiffOptions,
) -> Vec<PropertyChange> {
    let build = properties_for_period(build, period, params);
    let base = properties_for_period(base, period, params);

    let changed_keys = build
        .keys()
        .chain(base.keys().filter(|key| !build.contains_key(*key)))
        .filter(|key| build.get(*key) != base.get(*key));

    let mut changes = Vec::new();
    for key in changed_keys {
        let new_value = build.get(key).cloned().unwrap_or(Value::Null);
        let old_value = base.get(key);

        let change = if params.is_time_varying(key) {
            let mut change = PropertyChange {
                property: HEADWAY_SECS.to_string(),
                ..Default::default()
            };
            let numeric_delta = value_as_f64(&new_value).zip(old_value.and_then(value_as_f64));
            match numeric_delta {
                Some((new, old)) if !options.absolute => {
                    change.change = Some(number_value((new - old) * 60.0));
                }
                _ => change.set = Some(minutes_to_secs(&new_value)),
            }
            if options.validate_base || !options.absolute {
                change.existing = old_value.map(minutes_to_secs);
            }
            change
        } else {
            let mut change = PropertyChange::set(key.clone(), new_value);
            if options.validate_base {
                change.existing = old_value.cloned();
            }
            change
        };
        changes.push(change);
    }

    log::debug!("Evaluated {} property changes", changes.len());
    changes
}

/// Card properties for a whole line: headways in seconds, others as-is.
pub fn standard_properties(properties: &Map<String, Value>, params: &TransitParameters) -> Vec<PropertyChange> {
    properties
        .iter()
        .map(|(key, value)| {
            if params.is_time_varying(key) {
                PropertyChange::set(HEADWAY_SECS, minutes_to_secs(value))
            } else {
                PropertyChange::set(key.clone(), value.clone())
            }
        })
        .collect()
}
