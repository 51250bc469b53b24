//! Error types for NetCDF operations.

use std::path::PathBuf;

use composite_common::CompositeError;
use thiserror::Error;

/// Result type for NetCDF operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF reading and writing.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File does not exist
    #[error("NetCDF file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Error reported by the netcdf library
    #[error("NetCDF library error: {0}")]
    Netcdf(#[from] netcdf::Error),
}

impl From<NetCdfError> for CompositeError {
    fn from(err: NetCdfError) -> Self {
        match err {
            NetCdfError::FileNotFound { path } => CompositeError::not_found("NetCDF file", path),
            NetCdfError::IoError(e) => CompositeError::Io(e),
            other => CompositeError::FormatError(other.to_string()),
        }
    }
}

impl From<CompositeError> for NetCdfError {
    fn from(err: CompositeError) -> Self {
        NetCdfError::InvalidFormat(err.to_string())
    }
}
