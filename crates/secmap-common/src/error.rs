//! Error types for the secmap pipeline

use thiserror::Error;

/// Result type alias for secmap operations
pub type Result<T> = std::result::Result<T, SecmapError>;

/// Main error type for the secmap pipeline
#[derive(Error, Debug)]
pub enum SecmapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Spreadsheet error: {0}. Check the file path and the sheet name.")]
    Spreadsheet(String),

    #[error("Shapefile error: {0}")]
    Shapefile(String),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Render error: {0}")]
    Render(String),
}
