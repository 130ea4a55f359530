//! Reconcile command implementation.

use crate::cli::ReconcileArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::provider::OracleProvider;
use quarry_domain::traits::ArtifactStore;
use quarry_domain::SheetRecord;
use quarry_extractor::{ConcurrencyLimit, ReconcileReport};
use quarry_llm::OracleClient;
use quarry_pipeline::reconcile_saved_sheet;
use quarry_store::{JsonDirStore, SqliteArtifactStore};
use std::fmt::Display;
use std::sync::Arc;

/// Execute the reconcile command.
///
/// `out_dir` is either the JSON artifact directory of one workbook or its
/// SQLite database file.
pub async fn execute_reconcile(args: ReconcileArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let path = args.out_dir.clone();
    if !path.exists() {
        return Err(CliError::InvalidInput(format!(
            "'{}' does not exist",
            path.display()
        )));
    }

    let settings = super::oracle_settings(&config.oracle, args.provider, args.model);
    let oracle = OracleClient::new(OracleProvider::from_settings(&settings)?, config.retry);
    let limit = config.pipeline.extractor.boundary_concurrency;

    let (report, record) = if path.is_dir() {
        reconcile_in(oracle, Arc::new(JsonDirStore::new(&path)?), &args.sheet, limit).await?
    } else {
        reconcile_in(oracle, Arc::new(SqliteArtifactStore::new(&path)?), &args.sheet, limit).await?
    };

    println!("{}", formatter.format_reconcile(&report, &record)?);
    Ok(())
}

async fn reconcile_in<S>(
    oracle: OracleClient<OracleProvider>,
    store: Arc<S>,
    sheet: &str,
    limit: ConcurrencyLimit,
) -> Result<(ReconcileReport, SheetRecord)>
where
    S: ArtifactStore + Send + Sync + 'static,
    S::Error: Display,
{
    Ok(reconcile_saved_sheet(oracle, store, sheet, limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_directory_is_invalid_input() {
        let args = ReconcileArgs {
            out_dir: PathBuf::from("/definitely/not/here"),
            sheet: "Bill 1".to_string(),
            provider: None,
            model: None,
        };
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        let result = execute_reconcile(args, &Config::default(), &formatter).await;
        assert!(matches!(result, Err(CliError::InvalidInput(_))));
    }
}
