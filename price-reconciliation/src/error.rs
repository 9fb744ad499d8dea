//! Error types for price reconciliation

use crate::types::Warehouse;
use thiserror::Error;

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciliation errors
///
/// Per-line problems are not errors; they are recorded as
/// [`LineIssue`](crate::types::LineIssue) flags and never abort a batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Two authoritative entries for one normalized product name
    #[error("Duplicate reference entry in {warehouse} price table: {product}")]
    DuplicateReferenceEntry {
        /// Table the duplicate was found in
        warehouse: Warehouse,
        /// Normalized product name
        product: String,
    },

    /// A line's warehouse has no registered price table
    #[error("No price table registered for warehouse {0}")]
    UnregisteredWarehouse(Warehouse),

    /// Totals compared over different scopes
    #[error("Scope mismatch: {ours} vs {reference}")]
    ScopeMismatch {
        /// Scope of our total
        ours: String,
        /// Scope of the reference total
        reference: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
