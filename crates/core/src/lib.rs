//! # lasso-core
//!
//! Project cards from network edits, and model networks from standard ones.
//!
//! - [`project`]: difference a base and build network (transit line files,
//!   roadway edit logs or change tables) into a [`card::ProjectCard`]
//! - [`scenario`]: apply ordered project cards onto base networks
//! - [`model`]: flatten a standard roadway network into travel-model
//!   columns and write it as fixed-width, CSV or GeoJSON

pub mod card;
pub mod changes;
pub mod columns;
pub mod error;
pub mod model;
pub mod parameters;
pub mod project;
pub mod roadway;
pub mod scenario;

// Re-export transit from the transit crate
pub use lasso_transit as transit;

pub use error::{LassoError, Result};

pub mod prelude {
    pub use crate::card::{Change, ProjectCard};
    pub use crate::changes::{ChangeTable, evaluate_roadway_changes};
    pub use crate::error::{LassoError, Result};
    pub use crate::model::ModelRoadwayNetwork;
    pub use crate::parameters::Parameters;
    pub use crate::project::{Project, ProjectBuilder};
    pub use crate::roadway::RoadwayNetwork;
    pub use crate::scenario::{BaseNetworks, Scenario, ScenarioSummary};
    pub use crate::transit::{CubeTransit, StandardTransit, TransitParameters};
}
