//! Core error types

use thiserror::Error;

/// Core error type for Binroute
#[derive(Debug, Error)]
pub enum CoreError {
    /// Coordinates outside the valid longitude/latitude ranges
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
