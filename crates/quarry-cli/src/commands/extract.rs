//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::config::{Config, StoreKind};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::provider::OracleProvider;
use quarry_domain::traits::ArtifactStore;
use quarry_domain::{safe_name, WorkbookExtractionSummary};
use quarry_llm::OracleClient;
use quarry_pipeline::{
    CalamineWorkbook, FixedHeaderLocator, HeaderLocator, OracleHeaderLocator, Pipeline,
    PipelineConfig,
};
use quarry_store::{JsonDirStore, SqliteArtifactStore};
use std::fmt::Display;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Execute the extract command.
pub async fn execute_extract(args: ExtractArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let pipeline_config = pipeline_config(&config.pipeline, &args)?;
    let settings = super::oracle_settings(&config.oracle, args.provider, args.model.clone());
    let store_kind = args.store.map(Into::into).unwrap_or(config.output.store);
    let out = args.out.clone().unwrap_or_else(|| config.output.dir.clone());

    let workbook = CalamineWorkbook::open(&args.file)?;
    let label = workbook.label();

    let oracle = OracleClient::new(OracleProvider::from_settings(&settings)?, config.retry);
    let locator: Arc<dyn HeaderLocator> = match args.header_row {
        Some(row) => Arc::new(FixedHeaderLocator::new(row)),
        None => Arc::new(OracleHeaderLocator::from_config(oracle.clone(), &pipeline_config)),
    };

    info!(
        "Extracting '{}' with {} ({:?} strategy, {} rows per chunk)",
        args.file.display(),
        settings.model,
        pipeline_config.extractor.strategy,
        pipeline_config.extractor.chunk_size
    );

    fs::create_dir_all(&out)?;
    let location = artifact_location(&out, &label, store_kind);
    let run = Extraction {
        oracle,
        workbook,
        locator,
        config: pipeline_config,
        label: label.clone(),
        sheets: args.sheets,
    };

    let summary = match store_kind {
        StoreKind::Json => run.execute(Arc::new(JsonDirStore::new(&location)?)).await,
        StoreKind::Sqlite => run.execute(Arc::new(SqliteArtifactStore::new(&location)?)).await,
    };

    println!("{}", formatter.format_workbook(&summary)?);
    if let Some(error) = summary.error {
        return Err(CliError::Workbook {
            workbook: label,
            error,
        });
    }

    if formatter.is_table() {
        println!(
            "{}",
            formatter.info(&format!("Artifacts written to {}", location.display()))
        );
    }

    Ok(())
}

/// Pipeline configuration with the command-line overrides applied.
fn pipeline_config(base: &PipelineConfig, args: &ExtractArgs) -> Result<PipelineConfig> {
    let mut config = base.clone();
    if let Some(chunk_size) = args.chunk_size {
        config.extractor.chunk_size = chunk_size;
    }
    if let Some(strategy) = args.strategy {
        config.extractor.strategy = strategy.into();
    }
    config.validate().map_err(CliError::InvalidInput)?;
    Ok(config)
}

/// Directory (JSON) or database file (SQLite) for one workbook's artifacts.
fn artifact_location(out: &std::path::Path, label: &str, store: StoreKind) -> PathBuf {
    let name = safe_name(label);
    match store {
        StoreKind::Json => out.join(name),
        StoreKind::Sqlite => out.join(format!("{}.sqlite", name)),
    }
}

/// Everything a workbook run needs except the store.
struct Extraction {
    oracle: OracleClient<OracleProvider>,
    workbook: CalamineWorkbook,
    locator: Arc<dyn HeaderLocator>,
    config: PipelineConfig,
    label: String,
    sheets: Vec<String>,
}

impl Extraction {
    async fn execute<S>(self, store: Arc<S>) -> WorkbookExtractionSummary
    where
        S: ArtifactStore + Send + Sync + 'static,
        S::Error: Display,
    {
        let pipeline = Arc::new(Pipeline::new(
            self.oracle,
            store,
            Arc::new(self.workbook),
            self.locator,
            self.config,
        ));

        if self.sheets.is_empty() {
            pipeline.run_workbook(&self.label).await
        } else {
            pipeline.run_sheets(&self.label, self.sheets).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command, StrategyArg};
    use crate::config::OutputFormat;
    use clap::Parser;
    use quarry_extractor::StitchStrategy;
    use std::path::Path;

    fn extract_args(argv: &[&str]) -> ExtractArgs {
        match Cli::parse_from(argv).command {
            Command::Extract(args) => args,
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let mut args = extract_args(&["quarry", "extract", "boq.xlsx", "--chunk-size", "12"]);
        args.strategy = Some(StrategyArg::Reconcile);

        let config = pipeline_config(&PipelineConfig::default(), &args).unwrap();
        assert_eq!(config.extractor.chunk_size, 12);
        assert_eq!(config.extractor.strategy, StitchStrategy::Reconcile);
        assert_eq!(config.header_scan_rows, 20);
    }

    #[test]
    fn test_zero_chunk_size_is_invalid_input() {
        let args = extract_args(&["quarry", "extract", "boq.xlsx", "--chunk-size", "0"]);
        assert!(matches!(
            pipeline_config(&PipelineConfig::default(), &args),
            Err(CliError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_artifact_location() {
        let out = Path::new("outputs");
        assert_eq!(
            artifact_location(out, "Riverside BoQ", StoreKind::Json),
            PathBuf::from("outputs/Riverside_BoQ")
        );
        assert_eq!(
            artifact_location(out, "Riverside BoQ", StoreKind::Sqlite),
            PathBuf::from("outputs/Riverside_BoQ.sqlite")
        );
    }

    #[tokio::test]
    async fn test_missing_workbook_fails_before_any_call() {
        let args = extract_args(&["quarry", "extract", "/definitely/not/here.xlsx"]);
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        let result = execute_extract(args, &Config::default(), &formatter).await;
        assert!(matches!(result, Err(CliError::Pipeline(_))));
    }
}
