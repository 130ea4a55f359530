//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Oracle provider could not be built
    #[error("Oracle error: {0}")]
    Llm(#[from] quarry_llm::LlmError),

    /// Artifact store error
    #[error("Store error: {0}")]
    Store(#[from] quarry_store::StoreError),

    /// Pipeline error
    #[error(transparent)]
    Pipeline(#[from] quarry_pipeline::PipelineError),

    /// Row-range planning error
    #[error("Planning error: {0}")]
    Plan(#[from] quarry_domain::PlanError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The workbook could not be processed at all
    #[error("Workbook '{workbook}' failed: {error}")]
    Workbook {
        /// Workbook label
        workbook: String,
        /// Failure reason
        error: String,
    },
}
