//! # lasso-transit
//!
//! Cube transit line files and the changes between two sets of them.
//!
//! ## Features
//!
//! - **Line files**: Parse and write PT/TRNBUILD `.lin` files, including PT
//!   system records
//! - **Differencing**: Turn a base and build line set into project-card changes
//! - **Application**: Apply those changes back onto a line set
//! - **Standard feeds**: Convert frequency-based feeds to lines and back
//!
//! ## Example
//!
//! ```
//! use lasso_transit::prelude::*;
//!
//! let base = CubeTransit::from_source(
//!     r#"LINE NAME="0_452-111_452_pk1", MODE=5, HEADWAY[1]=10, NODES=39249, -39240, 54648"#,
//! ).unwrap();
//! let build = CubeTransit::from_source(
//!     r#"LINE NAME="0_452-111_452_pk1", MODE=5, HEADWAY[1]=15, NODES=39249, -39240, 54648"#,
//! ).unwrap();
//!
//! let params = TransitParameters::default();
//! let changes = evaluate_differences(&base, &build, &params, DiffOptions::default()).unwrap();
//! assert_eq!(changes.len(), 1);
//! assert_eq!(changes[0].properties()[0], PropertyChange::set("headway_secs", 900));
//! ```

pub mod apply;
pub mod changes;
pub mod cube;
pub mod diff;
pub mod identifiers;
pub mod models;
pub mod naming;
pub mod parameters;
pub mod standard;

// Re-exports for convenience
pub mod prelude {
    pub use crate::changes::*;
    pub use crate::cube::{CubeTransit, PtRecordKind, PtSystem};
    pub use crate::diff::{evaluate_differences, DiffOptions};
    pub use crate::identifiers::*;
    pub use crate::models::{line::Line, time_period::*, types::*};
    pub use crate::naming::RouteName;
    pub use crate::parameters::TransitParameters;
    pub use crate::standard::StandardTransit;
}

pub use prelude::*;
