//! Time period and crosswalk settings used by the transit side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::line::{base_of_key, Line};
use crate::models::time_period::{TimePeriodTable, TimeSpan};
use crate::models::types::{Result, TransitError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitParameters {
    /// Network time periods, e.g. `AM -> [6:00, 9:00]`
    pub time_periods: TimePeriodTable,
    /// Cube line-file period number to network period, e.g. `"1" -> AM`
    pub transit_to_network_time_periods: BTreeMap<String, String>,
    /// Network period to the token used in line names, e.g. `AM -> pk`
    pub network_to_demand_time_periods: BTreeMap<String, String>,
    /// Attributes written per period as `PROP[n]`
    pub time_varying_properties: Vec<String>,
    /// GTFS `route_type` to Cube `MODE`
    pub mode_crosswalk: BTreeMap<String, i64>,
    /// GTFS `agency_id` to Cube `OPERATOR`
    pub operator_crosswalk: BTreeMap<String, i64>,
}

impl Default for TransitParameters {
    fn default() -> Self {
        let period = |abbr: &str, start: i64, end: i64| {
            (abbr.to_string(), TimeSpan::from_hours(start, end))
        };

        Self {
            time_periods: TimePeriodTable::new([
                period("AM", 6, 9),
                period("MD", 9, 16),
                period("PM", 16, 19),
                period("NT", 19, 6),
            ]),
            transit_to_network_time_periods: [("1", "AM"), ("2", "MD")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            network_to_demand_time_periods: [("AM", "pk"), ("MD", "op")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            time_varying_properties: vec!["HEADWAY".to_string(), "FREQ".to_string()],
            mode_crosswalk: BTreeMap::new(),
            operator_crosswalk: BTreeMap::new(),
        }
    }
}

impl TransitParameters {
    /// Every `PROP[n]` key for the time-varying properties and transit periods.
    pub fn time_period_properties_list(&self) -> Vec<String> {
        self.time_varying_properties
            .iter()
            .flat_map(|p| {
                self.transit_to_network_time_periods
                    .keys()
                    .map(move |n| format!("{p}[{n}]"))
            })
            .collect()
    }

    /// Keys of the time-varying properties for one transit period number.
    pub fn properties_for_period(&self, number: &str) -> Vec<String> {
        self.time_varying_properties
            .iter()
            .map(|p| format!("{p}[{number}]"))
            .collect()
    }

    pub fn is_time_varying(&self, key: &str) -> bool {
        key.contains('[') && self.time_varying_properties.iter().any(|p| p == base_of_key(key))
    }

    pub fn network_period(&self, number: &str) -> Result<&str> {
        self.transit_to_network_time_periods
            .get(number)
            .map(String::as_str)
            .ok_or_else(|| TransitError::UnknownTimePeriod(number.to_string()))
    }

    pub fn transit_period_number(&self, network_period: &str) -> Result<&str> {
        self.transit_to_network_time_periods
            .iter()
            .find(|(_, v)| v.as_str() == network_period)
            .map(|(k, _)| k.as_str())
            .ok_or_else(|| TransitError::UnknownTimePeriod(network_period.to_string()))
    }

    pub fn demand_abbreviation(&self, network_period: &str) -> Result<&str> {
        self.network_to_demand_time_periods
            .get(network_period)
            .map(String::as_str)
            .ok_or_else(|| TransitError::UnknownTimePeriod(network_period.to_string()))
    }

    /// Network period named by a line-name token such as `pk`.
    pub fn network_period_for_demand(&self, token: &str) -> Result<&str> {
        self.network_to_demand_time_periods
            .iter()
            .find(|(_, v)| v.as_str() == token)
            .map(|(k, _)| k.as_str())
            .ok_or_else(|| TransitError::UnknownTimePeriod(token.to_string()))
    }

    /// Span from the earliest to the latest of a line's time periods.
    pub fn line_time_span(&self, line: &Line) -> Result<TimeSpan> {
        let numbers = line.time_period_numbers();
        let periods = numbers
            .iter()
            .map(|n| self.network_period(n))
            .collect::<Result<Vec<_>>>()?;
        self.time_periods.bounding_span(periods)
    }

    pub fn validate(&self) -> Result<()> {
        for (number, period) in &self.transit_to_network_time_periods {
            if !self.time_periods.contains(period) {
                return Err(TransitError::InvalidData(format!(
                    "transit time period {number} maps to undefined network period {period}"
                )));
            }
        }
        for period in self.network_to_demand_time_periods.keys() {
            if !self.time_periods.contains(period) {
                return Err(TransitError::InvalidData(format!(
                    "demand time period mapping uses undefined network period {period}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters_validate() {
        let params = TransitParameters::default();
        params.validate().unwrap();
        assert_eq!(
            params.time_period_properties_list(),
            vec!["HEADWAY[1]", "HEADWAY[2]", "FREQ[1]", "FREQ[2]"]
        );
    }

    #[test]
    fn test_period_lookups() {
        let params = TransitParameters::default();
        assert_eq!(params.network_period("2").unwrap(), "MD");
        assert_eq!(params.transit_period_number("AM").unwrap(), "1");
        assert_eq!(params.demand_abbreviation("MD").unwrap(), "op");
        assert_eq!(params.network_period_for_demand("pk").unwrap(), "AM");
        assert!(params.network_period("7").is_err());
    }

    #[test]
    fn test_line_time_span() {
        let params = TransitParameters::default();
        let line = Line::new("0_452-111_452_pk1")
            .with_property("HEADWAY[1]", 10)
            .with_property("HEADWAY[2]", 20);

        let span = params.line_time_span(&line).unwrap();
        assert_eq!(span.to_strings(), ["06:00".to_string(), "16:00".to_string()]);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let params: TransitParameters =
            serde_json::from_str(r#"{"network_to_demand_time_periods": {"AM": "am", "MD": "md"}}"#)
                .unwrap();
        assert_eq!(params.demand_abbreviation("AM").unwrap(), "am");
        assert_eq!(params.network_period("1").unwrap(), "AM");
    }

    #[test]
    fn test_validate_rejects_unknown_period() {
        let mut params = TransitParameters::default();
        params
            .transit_to_network_time_periods
            .insert("3".to_string(), "EV".to_string());
        assert!(params.validate().is_err());
    }
}
