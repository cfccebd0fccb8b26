//! Split model column names such as `ML_price_hov2_AM` into their parts.

use crate::parameters::Parameters;

const MANAGED_PREFIX: &str = "ML";
const DELIMITER: char = '_';

/// Parts of a column name laid out as `[ML_]base[_category][_timeperiod]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnParts {
    pub base_name: String,
    pub time_period: Option<String>,
    pub category: Option<String>,
    pub managed: bool,
}

impl ColumnParts {
    /// Name of the network property the column belongs to (`ML_lanes` for a
    /// managed-lane column).
    pub fn property_name(&self) -> String {
        if self.managed {
            format!("{MANAGED_PREFIX}{DELIMITER}{}", self.base_name)
        } else {
            self.base_name.clone()
        }
    }
}

/// Time period and category are only recognised as trailing parts, so base
/// names may themselves contain the delimiter (`trn_priority_AM`).
pub fn column_name_to_parts(column: &str, params: &Parameters) -> ColumnParts {
    let mut parts: Vec<&str> = column.split(DELIMITER).collect();

    let managed = parts.len() > 1 && parts[0] == MANAGED_PREFIX;
    if managed {
        parts.remove(0);
    }

    let time_period = pop_suffix(&mut parts, |p| params.transit.time_periods.contains(p));
    let category = pop_suffix(&mut parts, |p| params.categories.contains_key(p));

    ColumnParts {
        base_name: parts.join("_"),
        time_period: time_period.map(str::to_string),
        category: category.map(str::to_string),
        managed,
    }
}

/// Remove the last part if it matches, never leaving the name empty.
fn pop_suffix<'a>(parts: &mut Vec<&'a str>, is_suffix: impl Fn(&str) -> bool) -> Option<&'a str> {
    let last = *parts.last()?;
    if parts.len() > 1 && is_suffix(last) {
        parts.pop()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(column: &str) -> ColumnParts {
        column_name_to_parts(column, &Parameters::default())
    }

    #[test]
    fn test_plain_column() {
        let p = parts("distance");
        assert_eq!(p.base_name, "distance");
        assert_eq!(p.time_period, None);
        assert_eq!(p.category, None);
        assert!(!p.managed);
    }

    #[test]
    fn test_time_period_and_category() {
        let p = parts("price_hov2_AM");
        assert_eq!(p.base_name, "price");
        assert_eq!(p.category.as_deref(), Some("hov2"));
        assert_eq!(p.time_period.as_deref(), Some("AM"));

        let p = parts("trn_priority_PM");
        assert_eq!(p.base_name, "trn_priority");
        assert_eq!(p.time_period.as_deref(), Some("PM"));
    }

    #[test]
    fn test_managed_lane_column() {
        let p = parts("ML_lanes_MD");
        assert!(p.managed);
        assert_eq!(p.base_name, "lanes");
        assert_eq!(p.property_name(), "ML_lanes");
        assert_eq!(p.time_period.as_deref(), Some("MD"));
    }

    #[test]
    fn test_lone_period_name_is_a_base_name() {
        let p = parts("AM");
        assert_eq!(p.base_name, "AM");
        assert_eq!(p.time_period, None);
    }
}
