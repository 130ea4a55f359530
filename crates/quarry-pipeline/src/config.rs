//! Configuration for pipeline runs

use quarry_extractor::{ConcurrencyLimit, ExtractorConfig};
use serde::{Deserialize, Serialize};

/// Configuration for sheet and workbook runs
///
/// # Examples
///
/// ```
/// use quarry_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.extractor.chunk_size, 30);
/// assert_eq!(config.header_scan_rows, 20);
///
/// let config = PipelineConfig::aggressive();
/// assert_eq!(config.extractor.chunk_size, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Chunk extraction settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Gate for sheets processed at the same time
    #[serde(default)]
    pub sheet_concurrency: ConcurrencyLimit,

    /// Leading rows shown to the header locator
    /// Default: 20
    #[serde(default = "default_header_scan_rows")]
    pub header_scan_rows: usize,

    /// Minimum line similarity for a sheet row to match a located header line
    /// Default: 0.7
    #[serde(default = "default_header_match_threshold")]
    pub header_match_threshold: f64,

    /// Write the records of every successful sheet into one combined artifact
    /// Default: true
    #[serde(default = "default_combine_sheets")]
    pub combine_sheets: bool,
}

fn default_header_scan_rows() -> usize {
    20
}

fn default_header_match_threshold() -> f64 {
    0.7
}

fn default_combine_sheets() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::default(),
            sheet_concurrency: ConcurrencyLimit::default(),
            header_scan_rows: default_header_scan_rows(),
            header_match_threshold: default_header_match_threshold(),
            combine_sheets: default_combine_sheets(),
        }
    }
}

impl PipelineConfig {
    /// Aggressive configuration (small chunks)
    pub fn aggressive() -> Self {
        Self {
            extractor: ExtractorConfig::aggressive(),
            ..Self::default()
        }
    }

    /// Lenient configuration (large chunks, looser header matching)
    pub fn lenient() -> Self {
        Self {
            extractor: ExtractorConfig::lenient(),
            header_scan_rows: 40,
            header_match_threshold: 0.6,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.extractor.validate()?;
        self.sheet_concurrency.validate()?;

        if self.header_scan_rows == 0 {
            return Err("header_scan_rows must be greater than 0".to_string());
        }

        if !(self.header_match_threshold > 0.0 && self.header_match_threshold <= 1.0) {
            return Err("header_match_threshold must be in (0.0, 1.0]".to_string());
        }

        Ok(())
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
