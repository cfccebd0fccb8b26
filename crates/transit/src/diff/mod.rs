//! Differences between a base and a build line set, as transit changes.
//!
//! Lines are matched by name. A build line running in time periods its base
//! line does not is split into one line per extra period, each added as new
//! service, because base lines carry exactly one period.

pub mod properties;
pub mod shape;

use log::{debug, info};

use crate::changes::{TransitChange, TransitFacility, TransitServiceChange, TransitServiceDeletion};
use crate::cube::CubeTransit;
use crate::identifiers::LineName;
use crate::models::line::Line;
use crate::models::types::{Result, TransitError};
use crate::naming::RouteName;
use crate::parameters::TransitParameters;

pub use properties::{property_differences, standard_properties, HEADWAY_SECS};
pub use shape::{diff_routing, routing_change, ROUTING_BUFFER};

/// How numeric property differences are written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffOptions {
    /// `set` the build value rather than a `change` from the base value
    pub absolute: bool,
    /// Include the base value as `existing`
    pub validate_base: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            absolute: true,
            validate_base: false,
        }
    }
}

/// Changes that turn `base` into `build`.
///
/// Updates come first (property and routing changes as separate records),
/// then deletions, then additions.
pub fn evaluate_differences(
    base: &CubeTransit,
    build: &CubeTransit,
    params: &TransitParameters,
    options: DiffOptions,
) -> Result<Vec<TransitChange>> {
    // Extra time periods split lines, so work on a copy of the build set.
    let mut build = build.clone();

    let to_update: Vec<LineName> = build.line_names().filter(|n| base.contains(n.as_str())).cloned().collect();
    let mut to_delete: Vec<LineName> = base.line_names().filter(|n| !build.contains(n.as_str())).cloned().collect();
    let mut to_add: Vec<LineName> = build.line_names().filter(|n| !base.contains(n.as_str())).cloned().collect();

    info!(
        "Transit lines: {} to compare, {} deleted, {} added",
        to_update.len(),
        to_delete.len(),
        to_add.len()
    );

    let mut changes = Vec::new();

    for name in &to_update {
        debug!("Finding differences in time periods for: {name}");
        let base_line = line_or_err(base, name)?;
        let base_periods = base_line.time_period_numbers();
        let [base_period] = base_periods.as_slice() else {
            return Err(TransitError::InvalidData(format!(
                "Base network line {name} should only have one time period per route, but {base_periods:?} found"
            )));
        };

        let build_periods = line_or_err(&build, name)?.time_period_numbers();
        for period in build_periods.iter().filter(|p| !base_periods.contains(p)) {
            to_add.push(add_additional_time_period(&mut build, period, name, params)?);
        }
        if !build_periods.contains(base_period) {
            // The line no longer runs in its base period.
            to_delete.push(name.clone());
            continue;
        }

        let build_line = line_or_err(&build, name)?;
        let property_changes =
            property_differences(&build_line.properties, &base_line.properties, base_period, params, options);
        let routing = routing_change(&base_line.signed_nodes(), &build_line.signed_nodes());

        if !property_changes.is_empty() {
            changes.push(TransitChange::Update(TransitServiceChange {
                facility: facility(build_line, params, false)?,
                properties: property_changes,
            }));
        }
        if let Some(routing) = routing {
            changes.push(TransitChange::Update(TransitServiceChange {
                facility: facility(build_line, params, false)?,
                properties: vec![routing],
            }));
        }
    }

    for name in &to_delete {
        let line = line_or_err(base, name)?;
        debug!("Deleting {name}");
        changes.push(TransitChange::Delete(TransitServiceDeletion {
            facility: facility(line, params, false)?,
        }));
    }

    // New lines running in several periods are split too; the list grows
    // while it is walked.
    let mut i = 0;
    while i < to_add.len() {
        let name = to_add[i].clone();
        let periods = line_or_err(&build, &name)?.time_period_numbers();
        for period in periods.iter().skip(1) {
            to_add.push(add_additional_time_period(&mut build, period, &name, params)?);
        }
        i += 1;
    }

    for name in &to_add {
        let line = line_or_err(&build, name)?;
        debug!("Adding {name}");
        let mut properties = standard_properties(&line.properties, params);
        properties.push(crate::changes::PropertyChange::set(
            "routing",
            shape::nodes_value(&line.signed_nodes()),
        ));
        changes.push(TransitChange::Add(TransitServiceChange {
            facility: facility(line, params, true)?,
            properties,
        }));
    }

    info!("Found {} transit changes", changes.len());
    Ok(changes)
}

fn line_or_err<'a>(transit: &'a CubeTransit, name: &LineName) -> Result<&'a Line> {
    transit
        .line(name.as_str())
        .ok_or_else(|| TransitError::LineNotFound(name.clone()))
}

/// Copy a line into another time period, keeping only that period's
/// time-varying attributes on the copy and removing them from the original.
///
/// Returns the name of the new line.
pub fn add_additional_time_period(
    transit: &mut CubeTransit,
    period: &str,
    original: &LineName,
    params: &TransitParameters,
) -> Result<LineName> {
    debug!("Adding time period {period} to line {original}");
    let route = RouteName::parse(original.as_str())?;
    let network_period = params.network_period(period)?;
    let token = params.demand_abbreviation(network_period)?;
    let new_name = RouteName::new(route.route_id, token, route.agency_id, route.direction_id).line_name();

    if transit.contains(new_name.as_str()) {
        return Err(TransitError::DuplicateLine(new_name));
    }

    let this_period = params.properties_for_period(period);
    let other_periods: Vec<String> = params
        .time_period_properties_list()
        .into_iter()
        .filter(|key| !this_period.contains(key))
        .collect();

    let source = transit
        .line_mut(original.as_str())
        .ok_or_else(|| TransitError::LineNotFound(original.clone()))?;
    let mut copy = source.clone();
    for key in &this_period {
        source.properties.shift_remove(key);
    }

    copy.name = new_name.clone();
    for key in &other_periods {
        copy.properties.shift_remove(key);
    }
    transit.add_line(copy)?;
    Ok(new_name)
}

/// Facility selecting a line: route and direction from its name, times from
/// the span of its time periods.
pub fn facility(line: &Line, params: &TransitParameters, with_agency: bool) -> Result<TransitFacility> {
    let route = RouteName::parse(line.name.as_str())?;
    let direction_id = route
        .direction_number()
        .ok_or_else(|| TransitError::InvalidLineName(line.name.to_string()))?;
    let [start_time, end_time] = params.line_time_span(line)?.to_strings();

    Ok(TransitFacility {
        route_id: route.route_id,
        direction_id,
        start_time,
        end_time,
        agency_id: with_agency.then_some(route.agency_id),
    })
}
