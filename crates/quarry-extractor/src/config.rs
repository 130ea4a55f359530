//! Configuration for the Extractor

use crate::gate::ConcurrencyLimit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How records split across chunk boundaries are stitched back together
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StitchStrategy {
    /// Thread the open block forward from chunk to chunk (sequential)
    #[default]
    Forward,
    /// Extract chunks independently, then merge adjacent boundaries
    Reconcile,
}

impl fmt::Display for StitchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StitchStrategy::Forward => write!(f, "forward"),
            StitchStrategy::Reconcile => write!(f, "reconcile"),
        }
    }
}

impl FromStr for StitchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(StitchStrategy::Forward),
            "reconcile" => Ok(StitchStrategy::Reconcile),
            other => Err(format!("Unknown stitch strategy: {}", other)),
        }
    }
}

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Data rows per oracle call
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Boundary stitching strategy
    #[serde(default)]
    pub strategy: StitchStrategy,

    /// Also write each forward chunk result as a boundary artifact, the
    /// version the reconciler reads and rewrites (independent extraction
    /// always writes it)
    #[serde(default = "default_persist_boundary_seed")]
    pub persist_boundary_seed: bool,

    /// Extra instructions appended to every extraction prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,

    /// Gate for independent chunk extraction and boundary pairs
    #[serde(default)]
    pub boundary_concurrency: ConcurrencyLimit,
}

fn default_chunk_size() -> usize {
    30
}

fn default_persist_boundary_seed() -> bool {
    true
}

impl ExtractorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }
        if self.chunk_size > 500 {
            return Err("chunk_size must be at most 500 rows".to_string());
        }
        self.boundary_concurrency.validate()
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            strategy: StitchStrategy::Forward,
            persist_boundary_seed: true,
            custom_instructions: None,
            boundary_concurrency: ConcurrencyLimit::default(),
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: smaller chunks, fewer rows per oracle call
    pub fn aggressive() -> Self {
        Self {
            chunk_size: 20,
            ..Self::default()
        }
    }

    /// Lenient preset: larger chunks, fewer boundaries to stitch
    pub fn lenient() -> Self {
        Self {
            chunk_size: 60,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
