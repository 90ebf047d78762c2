//! Error types for the marker coordinate load

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for marker coordinate load operations
pub type Result<T> = std::result::Result<T, MrkCoordError>;

/// Main error type for the marker coordinate load
///
/// Every variant is fatal for the run. Per-record problems are never errors;
/// they end up in the QC reports instead.
#[derive(Error, Debug)]
pub enum MrkCoordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open input file {}: {source}", path.display())]
    InputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open output file {}: {source}", path.display())]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Bulk load into {table} failed: {message}")]
    BulkLoad { table: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl MrkCoordError {
    /// Build an `InputFile` error for `path`
    pub fn input(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InputFile {
            path: path.into(),
            source,
        }
    }

    /// Build an `OutputFile` error for `path`
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputFile {
            path: path.into(),
            source,
        }
    }
}
