//! Error types for pipeline operations

use quarry_extractor::ExtractorError;
use quarry_llm::OracleCallFailure;
use thiserror::Error;

/// Errors that can occur while running a sheet or workbook
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The table source could not be opened or read
    #[error("Source error: {0}")]
    Source(String),

    /// The located header block does not occur in the sheet
    #[error("Header not found in sheet '{sheet}'")]
    HeaderNotFound {
        /// Sheet identifier
        sheet: String,
    },

    /// Oracle retries were exhausted
    #[error(transparent)]
    Oracle(#[from] OracleCallFailure),

    /// Chunk extraction or reconciliation error
    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    /// Artifact store error
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Wrap a store error
    pub fn store(e: impl std::fmt::Display) -> Self {
        PipelineError::Store(e.to_string())
    }
}
