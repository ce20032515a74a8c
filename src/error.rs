//! Error types for the classifier
//!
//! Each stage of the pipeline has its own error so callers can decide
//! what is fatal: decode failures go back to the caller, persistence
//! failures degrade gracefully, calibration failures are silent no-ops.

use thiserror::Error;

/// Image bytes could not be turned into a raster
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("input is empty")]
    Empty,

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),
}

/// History or threshold store is unavailable or returned bad data
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("could not prepare catalog location: {0}")]
    Io(#[from] std::io::Error),

    #[error("no data directory available for the catalog")]
    NoDataDir,

    #[error("store is unavailable")]
    Unavailable,
}

/// Calibration could not run over the current history
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("feature history is empty")]
    EmptyHistory,

    #[error("record {index} has a non-finite feature value")]
    MalformedRecord { index: usize },

    #[error("candidate grid is empty")]
    EmptyGrid,
}

/// Configuration file is unreadable or holds invalid values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error for classifier operations
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("background task failed: {0}")]
    Task(String),
}
