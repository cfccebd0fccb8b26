//! Core data types and enums for Cube transit data.

use std::fmt;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::identifiers::*;

// ============================================================================
// Enums
// ============================================================================

/// Which Cube program a line file targets, from its `;;<<PT>><<LINE>>;;` header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProgramType {
    #[default]
    Pt,
    TrnBuild,
}

impl ProgramType {
    pub fn from_header(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PT" => Some(Self::Pt),
            "TRNBUILD" => Some(Self::TrnBuild),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pt => "PT",
            Self::TrnBuild => "TRNBUILD",
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A single node in a line's routing.
///
/// Cube writes non-stop nodes as negative numbers; the sign is split out
/// into `stop` so `id` is always the model node id.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteNode {
    pub id: i64,
    pub stop: bool,
    /// 1-based position within the line
    pub order: usize,
    /// Node-level keywords such as `ACCESS` or `NNTIME`
    pub attributes: Map<String, Value>,
}

impl RouteNode {
    pub fn new(signed_id: i64, order: usize) -> Self {
        Self {
            id: signed_id.abs(),
            stop: signed_id > 0,
            order,
            attributes: Map::new(),
        }
    }

    /// Signed node number as written in a line file
    pub fn signed_id(&self) -> i64 {
        if self.stop {
            self.id
        } else {
            -self.id
        }
    }

    /// Routing token used in project cards: `"N"` for stops, `"-N"` otherwise
    pub fn token(&self) -> String {
        self.signed_id().to_string()
    }
}

/// A problem found in one block of a line file.
///
/// The block is skipped and parsing continues with the next `LINE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub line_number: usize,
    pub line_name: Option<String>,
    pub message: String,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.line_name {
            Some(name) => write!(f, "line {} ({}): {}", self.line_number, name, self.message),
            None => write!(f, "line {}: {}", self.line_number, self.message),
        }
    }
}

// ============================================================================
// Value helpers
// ============================================================================

/// Render an attribute value the way it appears in tabular outputs.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Numeric view of a value, accepting numeric strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Build a JSON number, keeping integers integral.
pub fn number_value(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Value::from(v as i64)
    } else {
        Value::from(v)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Line not found: {0}")]
    LineNotFound(LineName),

    #[error("Duplicate line name: {0}")]
    DuplicateLine(LineName),

    #[error("Invalid line name '{0}', expected agency_routeid_shortname_{{tp}}{{dir}}")]
    InvalidLineName(String),

    #[error("Unknown time period: {0}")]
    UnknownTimePeriod(String),

    #[error("Invalid time '{0}'")]
    InvalidTime(String),

    #[error("PT system {kind} NUMBER={number} is defined more than once")]
    PtSystemCollision { kind: String, number: i64 },

    #[error("Line file has no parsable content: {0}")]
    Parse(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl TransitError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_node_sign() {
        let stop = RouteNode::new(39249, 1);
        assert!(stop.stop);
        assert_eq!(stop.token(), "39249");

        let pass = RouteNode::new(-39240, 2);
        assert!(!pass.stop);
        assert_eq!(pass.id, 39240);
        assert_eq!(pass.token(), "-39240");
    }

    #[test]
    fn test_program_type_from_header() {
        assert_eq!(ProgramType::from_header("pt"), Some(ProgramType::Pt));
        assert_eq!(ProgramType::from_header("TRNBUILD"), Some(ProgramType::TrnBuild));
        assert_eq!(ProgramType::from_header("HWYNET"), None);
    }

    #[test]
    fn test_number_value_keeps_integers() {
        assert_eq!(number_value(600.0), Value::from(600));
        assert_eq!(number_value(1.5), Value::from(1.5));
        assert_eq!(value_as_f64(&Value::from(" 12 ")), Some(12.0));
    }
}
