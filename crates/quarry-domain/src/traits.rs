//! Trait definitions for external collaborators
//!
//! These traits define the boundaries between the extraction core and the
//! infrastructure it talks to. Implementations live in other crates.

use crate::artifact::ArtifactKey;
use crate::summary::TokenUsage;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Raw reply of one oracle call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Text content of the reply (expected to hold JSON)
    pub content: String,
    /// Tokens reported by the service
    pub usage: TokenUsage,
}

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (quarry-llm). Calls are blocking;
/// callers in async contexts run them on a blocking worker pool.
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Send system instructions and a user payload, return the raw reply
    fn complete(&self, system: &str, user: &str) -> Result<Completion, Self::Error>;

    /// Model identifier used for logging
    fn model_name(&self) -> &str;
}

/// Key/value persistence for JSON-shaped artifacts
///
/// Implemented by the infrastructure layer (quarry-store).
pub trait ArtifactStore {
    /// Error type for store operations
    type Error;

    /// Save (or overwrite) the artifact at `key`
    fn save<T: Serialize>(&self, key: &ArtifactKey, record: &T) -> Result<(), Self::Error>;

    /// Load the artifact at `key`; `Ok(None)` when it does not exist
    fn load<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<Option<T>, Self::Error>;

    /// Check whether an artifact exists
    fn exists(&self, key: &ArtifactKey) -> Result<bool, Self::Error>;
}

/// Source of tabular rows
///
/// Implemented by the pipeline layer (quarry-pipeline).
pub trait TableSource {
    /// Error type for source operations
    type Error;

    /// Sheet identifiers in document order
    fn sheet_names(&self) -> Result<Vec<String>, Self::Error>;

    /// Rows of one sheet, each an ordered sequence of string cells
    fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, Self::Error>;
}
