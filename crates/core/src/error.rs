//! Error types shared by all calura crates

use thiserror::Error;

/// Raster/vector level error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {cols}x{rows}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Grid geometry mismatch: {0}")]
    GridMismatch(String),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Malformed {format} data: {reason}")]
    Format { format: &'static str, reason: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a TIFF-level format error
    pub fn tiff(reason: impl ToString) -> Self {
        Error::Format {
            format: "GeoTIFF",
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a GeoJSON-level format error
    pub fn geojson(reason: impl ToString) -> Self {
        Error::Format {
            format: "GeoJSON",
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for calura operations
pub type Result<T> = std::result::Result<T, Error>;
