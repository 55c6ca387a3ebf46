//! Error types for the generation / integration / analysis pipeline
//!
//! Pipeline-level failures (bad sweep input, header lookup miss, cancellation)
//! abort a whole phase. Trajectory failures only abort the analysis of the one
//! configuration they belong to and are counted as skipped by the aggregator.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, DpsError>;

#[derive(Error, Debug)]
pub enum DpsError {
    /// Bad numeric input or mismatched sweep lists
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No default header bucket dominates the requested values
    #[error("no default header parameters for pericentre {pericentre} and planet distance {planet_distance}")]
    HeaderLookupMiss {
        pericentre: f64,
        planet_distance: f64,
    },

    #[error("trajectory file not found: {0}")]
    TrajectoryNotFound(PathBuf),

    #[error("trajectory file contains no complete rows: {0}")]
    TrajectoryEmpty(PathBuf),

    #[error("trajectory file {path} is malformed: {reason}")]
    TrajectoryMalformed { path: PathBuf, reason: String },

    /// The external integrator could not be launched
    #[error("integrator error: {0}")]
    Integrator(String),

    #[error("run was cancelled")]
    Cancelled,

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DpsError {
    /// Attach a path to an `std::io::Error`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DpsError::Io {
            path: path.into(),
            source,
        }
    }
}
