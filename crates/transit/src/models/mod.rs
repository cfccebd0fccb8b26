//! Line file data models and types.

pub mod line;
pub mod time_period;
pub mod types;

pub use line::Line;
pub use time_period::{TimePeriodTable, TimeSpan};
pub use types::{ParseDiagnostic, ProgramType, Result, RouteNode, TransitError};
