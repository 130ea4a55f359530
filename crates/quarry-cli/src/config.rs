//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use quarry_llm::RetryPolicy;
use quarry_pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Oracle provider settings
    #[serde(default)]
    pub oracle: OracleSettings,

    /// Retry policy for oracle calls
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Where artifacts are written
    #[serde(default)]
    pub output: OutputSettings,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// Oracle provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    /// Provider backend
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API endpoint; the provider's default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap (OpenAI only)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds (OpenAI only)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Oracle provider backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

/// Artifact output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Root directory; each workbook gets its own subdirectory
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Store backend
    #[serde(default)]
    pub store: StoreKind,
}

/// Artifact store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// One JSON file per artifact
    #[default]
    Json,
    /// One SQLite database per workbook
    Sqlite,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Get the default configuration file path.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".quarry").join("config.toml"))
    }

    /// Resolve an explicit path or fall back to the default one.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path(),
        }
    }

    /// Load configuration from `path`, or defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.retry.validate().map_err(CliError::Config)?;
        self.pipeline.validate().map_err(CliError::Config)?;

        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(CliError::Config(
                "oracle.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.oracle.model.trim().is_empty() {
            return Err(CliError::Config("oracle.model must not be empty".to_string()));
        }

        Ok(())
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            endpoint: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            store: StoreKind::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_model() -> String {
    quarry_llm::openai::DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    quarry_llm::openai::DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    quarry_llm::openai::DEFAULT_MAX_TOKENS
}

fn default_timeout_secs() -> u64 {
    quarry_llm::openai::DEFAULT_TIMEOUT_SECS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
