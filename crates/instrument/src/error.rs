//! Error types for the data instrument crate.

use thiserror::Error;

/// Result type alias for instrument operations.
pub type InstrumentResult<T> = Result<T, InstrumentError>;

/// Errors that can occur in instrument operations.
///
/// A singular lookup that matches nothing is not an error: it returns `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstrumentError {
    /// Failure reported by the backing store (connectivity, malformed query,
    /// constraint violation).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A lookup expected to be unique matched more than one row.
    #[error("Integrity violation: {count} {entity} rows match {key}")]
    Integrity {
        entity: &'static str,
        key: String,
        count: usize,
    },

    /// Instrument to update does not exist.
    #[error("Instrument not found: {0}")]
    NotFound(String),

    /// Filter criteria rejected at the boundary.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Month universe string could not be tokenized.
    #[error("Invalid month universe: {0}")]
    InvalidMonthUniverse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl InstrumentError {
    /// Whether this error reports duplicate rows behind a unique lookup.
    pub fn is_integrity(&self) -> bool {
        matches!(self, InstrumentError::Integrity { .. })
    }
}
