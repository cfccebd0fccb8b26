//! Line naming convention: `agency_routeid_shortname_{tp}{dir}`.
//!
//! For example `0_452-111_452_pk1` is agency `0`, route `452-111`, short
//! name `452`, time period `pk` and direction `1`.

use std::fmt;

use crate::identifiers::{AgencyIdentifier, LineName, RouteIdentifier};
use crate::models::types::{Result, TransitError};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteName {
    pub agency_id: AgencyIdentifier,
    pub route_id: RouteIdentifier,
    pub time_period: String,
    pub direction_id: String,
}

impl RouteName {
    pub fn parse(line_name: &str) -> Result<Self> {
        let name = line_name.trim().trim_matches('"');
        let parts: Vec<&str> = name.split('_').collect();
        let [agency, route, _short_name, tp_direction] = parts.as_slice() else {
            return Err(TransitError::InvalidLineName(line_name.to_string()));
        };

        let mut chars = tp_direction.chars();
        let direction = chars
            .next_back()
            .ok_or_else(|| TransitError::InvalidLineName(line_name.to_string()))?;

        Ok(Self {
            agency_id: AgencyIdentifier::new(agency),
            route_id: RouteIdentifier::new(route),
            time_period: chars.as_str().to_string(),
            direction_id: direction.to_string(),
        })
    }

    pub fn new(
        route_id: impl Into<RouteIdentifier>,
        time_period: impl Into<String>,
        agency_id: impl Into<AgencyIdentifier>,
        direction_id: impl fmt::Display,
    ) -> Self {
        Self {
            agency_id: agency_id.into(),
            route_id: route_id.into(),
            time_period: time_period.into(),
            direction_id: direction_id.to_string(),
        }
    }

    /// Short name is the route id up to its first `-`.
    pub fn short_name(&self) -> &str {
        self.route_id.as_str().split('-').next().unwrap_or_default()
    }

    pub fn line_name(&self) -> LineName {
        LineName::new(self.to_string())
    }

    /// Direction as a number when it is one (cards carry it as an integer).
    pub fn direction_number(&self) -> Option<i64> {
        self.direction_id.parse().ok()
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}{}",
            self.agency_id,
            self.route_id,
            self.short_name(),
            self.time_period,
            self.direction_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_route_name() {
        let name = RouteName::parse("\"0_452-111_452_pk1\"").unwrap();
        assert_eq!(name.agency_id.as_str(), "0");
        assert_eq!(name.route_id.as_str(), "452-111");
        assert_eq!(name.time_period, "pk");
        assert_eq!(name.direction_id, "1");
        assert_eq!(name.direction_number(), Some(1));
    }

    #[test]
    fn test_build_route_name() {
        let name = RouteName::new("452-111", "op", "0", 1);
        assert_eq!(name.to_string(), "0_452-111_452_op1");
        assert_eq!(RouteName::parse(&name.to_string()).unwrap(), name);
    }

    #[test]
    fn test_rejects_malformed_names() {
        assert!(RouteName::parse("452-111_pk1").is_err());
        assert!(RouteName::parse("0_452_452_pk1_extra").is_err());
        assert!(RouteName::parse("0_452_452_").is_err());
    }
}
