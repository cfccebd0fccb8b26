use std::path::PathBuf;

use crate::transit::TransitError;

#[derive(Debug, thiserror::Error)]
pub enum LassoError {
    #[error(transparent)]
    Transit(#[from] TransitError),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("GeoJSON error in {path}: {source}")]
    GeoJson {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },

    #[error("Invalid parameters: {0}")]
    Parameters(String),

    #[error("Incompatible base network: {0}")]
    IncompatibleNetwork(String),

    #[error("Invalid roadway changes: {0}")]
    InvalidChanges(String),

    #[error("Invalid project: {0}")]
    InvalidProject(String),

    #[error("Invalid project card: {0}")]
    InvalidCard(String),

    #[error("Roadway network: {0}")]
    Network(String),

    #[error("Scenario: {0}")]
    Scenario(String),
}

impl LassoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
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

    pub(crate) fn geojson(path: impl Into<PathBuf>, source: geojson::Error) -> Self {
        Self::GeoJson {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, LassoError>;
