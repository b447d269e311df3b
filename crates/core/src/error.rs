//! Error types for mseg

use thiserror::Error;

/// Main error type for mseg operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Missing merge parameter: {0}")]
    MissingParameter(String),

    #[error("Unsupported configuration: {0}")]
    Unsupported(String),

    #[error("Region {0} not found in region table")]
    RegionNotFound(u64),

    #[error("Invalid bounding box for region {id}: rows {start_row}..{bound_row}, cols {start_col}..{bound_col}")]
    InvalidBounds {
        id: u64,
        start_row: usize,
        start_col: usize,
        bound_row: usize,
        bound_col: usize,
    },

    #[error("CV table parse error at line {line}: {reason}")]
    CvTable { line: usize, reason: String },

    #[error("CV table has no entry for looks = {looks}, samples = {samples}")]
    CvTableLookup { looks: usize, samples: usize },

    #[error("Pyramid level {0} has been released")]
    LevelReleased(usize),

    #[error("Pyramid level {level} out of range (levels: {n_levels})")]
    LevelOutOfRange { level: usize, n_levels: usize },

    #[error("Band {band} out of range (bands: {band_count})")]
    BandOutOfRange { band: usize, band_count: usize },

    #[error("Segmentation cancelled")]
    Cancelled,

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for mseg operations
pub type Result<T> = std::result::Result<T, Error>;
