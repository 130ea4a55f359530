//! Error types for the Extractor

use quarry_domain::{PlanError, RowRange};
use quarry_llm::OracleCallFailure;
use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Oracle retries were exhausted
    #[error(transparent)]
    Oracle(#[from] OracleCallFailure),

    /// Artifact store error
    #[error("Store error: {0}")]
    Store(String),

    /// Requested range does not fit the sheet
    #[error("Row range {range} is outside the sheet ({rows} rows)")]
    RangeOutOfBounds {
        /// Requested range
        range: RowRange,
        /// Rows in the sheet
        rows: usize,
    },

    /// Row ranges could not be planned
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// A spawned task panicked or was cancelled
    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl ExtractorError {
    /// Wrap a store error
    pub fn store(e: impl std::fmt::Display) -> Self {
        ExtractorError::Store(e.to_string())
    }
}
