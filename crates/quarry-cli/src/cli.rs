//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Quarry CLI - Extract product records from spreadsheets with an LLM oracle.
#[derive(Debug, Parser)]
#[command(name = "quarry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (identifiers and counts only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract product records from a workbook
    Extract(ExtractArgs),

    /// Reconcile chunk boundaries of a sheet from saved artifacts
    Reconcile(ReconcileArgs),

    /// Show the row ranges a sheet would be split into
    Plan(PlanArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Workbook to read (xlsx, xlsm, xlsb, xls, ods)
    pub file: PathBuf,

    /// Only extract these sheets (repeatable)
    #[arg(short, long = "sheet")]
    pub sheets: Vec<String>,

    /// Rows per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// How records split across chunks are stitched
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Use this 0-based row (after empty rows are dropped) as the header
    /// instead of asking the oracle
    #[arg(long)]
    pub header_row: Option<usize>,

    /// Directory receiving the run's artifacts
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Artifact store backend
    #[arg(long, value_enum)]
    pub store: Option<StoreArg>,

    /// Oracle provider
    #[arg(long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Oracle model
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Arguments for the reconcile command.
#[derive(Debug, Parser)]
pub struct ReconcileArgs {
    /// Artifact directory of a workbook run, or its SQLite file
    pub out_dir: PathBuf,

    /// Sheet to reconcile
    #[arg(short, long)]
    pub sheet: String,

    /// Oracle provider
    #[arg(long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Oracle model
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Arguments for the plan command.
#[derive(Debug, Parser)]
pub struct PlanArgs {
    /// Data rows in the sheet
    #[arg(short, long)]
    pub rows: usize,

    /// Rows per chunk
    #[arg(short = 'k', long, default_value = "30")]
    pub chunk_size: usize,
}

/// Arguments for configuration management.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration management actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,
}

/// Stitch strategy argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StrategyArg {
    /// Carry the open block forward from chunk to chunk
    Forward,
    /// Extract chunks independently, then merge boundary records
    Reconcile,
}

/// Store backend argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StoreArg {
    /// One JSON file per artifact
    Json,
    /// One SQLite database per workbook
    Sqlite,
}

/// Provider argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ProviderArg {
    /// OpenAI chat completions
    Openai,
    /// Local Ollama server
    Ollama,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<StrategyArg> for quarry_extractor::StitchStrategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::Forward => quarry_extractor::StitchStrategy::Forward,
            StrategyArg::Reconcile => quarry_extractor::StitchStrategy::Reconcile,
        }
    }
}

impl From<StoreArg> for crate::config::StoreKind {
    fn from(store: StoreArg) -> Self {
        match store {
            StoreArg::Json => crate::config::StoreKind::Json,
            StoreArg::Sqlite => crate::config::StoreKind::Sqlite,
        }
    }
}

impl From<ProviderArg> for crate::config::ProviderKind {
    fn from(provider: ProviderArg) -> Self {
        match provider {
            ProviderArg::Openai => crate::config::ProviderKind::OpenAi,
            ProviderArg::Ollama => crate::config::ProviderKind::Ollama,
        }
    }
}
