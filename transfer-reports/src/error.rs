//! Error types for the reporting pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type for reporting operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reporting errors
#[derive(Error, Debug)]
pub enum Error {
    /// Reconciliation engine error
    #[error(transparent)]
    Reconciliation(#[from] price_reconciliation::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required column is missing from an input file
    #[error("{path}: missing column {column}")]
    MissingColumn {
        /// Input file
        path: PathBuf,
        /// Expected column
        column: &'static str,
    },

    /// A cell could not be parsed
    #[error("{path}:{row}: {message}")]
    Parse {
        /// Input file
        path: PathBuf,
        /// 1-based data row
        row: usize,
        /// What went wrong
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
