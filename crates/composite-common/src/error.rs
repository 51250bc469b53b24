//! Error types for the composite workflow.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using CompositeError.
pub type CompositeResult<T> = Result<T, CompositeError>;

/// Primary error type for composite building and model/observation comparison.
///
/// Every variant is fatal to the current run; nothing is retried.
#[derive(Debug, Error)]
pub enum CompositeError {
    // === Resource Errors ===
    #[error("{resource} not found at {}", path.display())]
    ResourceNotFound { resource: String, path: PathBuf },

    #[error("Malformed data: {0}")]
    FormatError(String),

    // === Composite Contract Errors ===
    #[error("Coordinate (lon={lon}, lat={lat}) of region {region} is outside the grid")]
    OutOfBoundsCoordinate { region: String, lon: f64, lat: f64 },

    #[error("Unknown set label: {0}")]
    UnknownSet(String),

    #[error("Variable '{variable}' not present in set {set}")]
    UnknownVariable { set: String, variable: String },

    #[error("Cell (lon={lon}, lat={lat}) claimed by both {first} and {second}")]
    OverlappingRegions {
        first: String,
        second: String,
        lon: f64,
        lat: f64,
    },

    // === Comparison Errors ===
    #[error("Cannot align grids: {0}")]
    AlignmentError(String),

    // === Infrastructure Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompositeError {
    /// Create a ResourceNotFound error.
    pub fn not_found(resource: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::ResourceNotFound {
            resource: resource.into(),
            path: path.into(),
        }
    }

    /// Create a FormatError.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::FormatError(msg.into())
    }

    /// Create an AlignmentError.
    pub fn alignment(msg: impl Into<String>) -> Self {
        Self::AlignmentError(msg.into())
    }

    /// Short machine-friendly name of the error kind, used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CompositeError::ResourceNotFound { .. } => "ResourceNotFound",
            CompositeError::FormatError(_) => "FormatError",
            CompositeError::OutOfBoundsCoordinate { .. } => "OutOfBoundsCoordinate",
            CompositeError::UnknownSet(_) => "UnknownSet",
            CompositeError::UnknownVariable { .. } => "UnknownVariable",
            CompositeError::OverlappingRegions { .. } => "OverlappingRegions",
            CompositeError::AlignmentError(_) => "AlignmentError",
            CompositeError::InvalidConfig(_) => "InvalidConfig",
            CompositeError::Io(_) => "Io",
        }
    }
}

impl From<serde_json::Error> for CompositeError {
    fn from(err: serde_json::Error) -> Self {
        CompositeError::FormatError(format!("JSON error: {}", err))
    }
}
