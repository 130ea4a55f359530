//! Sheet and workbook orchestration

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::metadata::{prepare_metadata, HeaderLocator};
use anyhow::Context;
use quarry_domain::traits::{ArtifactStore, LlmProvider, TableSource};
use quarry_domain::{
    ArtifactKey, RowRange, SheetExtractionSummary, SheetMetadata, SheetRecord, SheetTaggedRecord,
    TokenUsage, WorkbookExtractionSummary,
};
use quarry_extractor::{
    merge_sheet, BoundaryReconciler, ChunkExtractor, ConcurrencyLimit, ConcurrentChunkRunner,
    MergeSource, ReconcileReport, SequentialChunkRunner, StitchStrategy,
};
use quarry_llm::{LlmError, OracleClient};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Runs sheets and workbooks end to end
///
/// One sheet goes through metadata preparation, chunk extraction and merge.
/// A workbook runs its sheets concurrently behind the sheet concurrency
/// gate; a failing sheet is reported in the summary and never aborts its
/// siblings.
pub struct Pipeline<P, S, T, L: ?Sized> {
    oracle: OracleClient<P>,
    store: Arc<S>,
    source: Arc<T>,
    locator: Arc<L>,
    config: PipelineConfig,
}

impl<P, S, T, L> Pipeline<P, S, T, L>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
    S: ArtifactStore + Send + Sync + 'static,
    S::Error: Display,
    T: TableSource + Send + Sync + 'static,
    T::Error: Display,
    L: HeaderLocator + ?Sized + 'static,
{
    /// Create a pipeline
    pub fn new(
        oracle: OracleClient<P>,
        store: Arc<S>,
        source: Arc<T>,
        locator: Arc<L>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            oracle,
            store,
            source,
            locator,
            config,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Artifact store in use
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one sheet, converting any failure into the summary's error
    pub async fn run_sheet(&self, sheet: &str) -> SheetExtractionSummary {
        let started = Instant::now();

        match self.try_run_sheet(sheet).await {
            Ok(mut summary) => {
                summary.elapsed_ms = elapsed_ms(started);
                info!(
                    "Sheet '{}' finished in {}ms: {} records, {} prompt / {} completion tokens",
                    sheet,
                    summary.elapsed_ms,
                    summary.records,
                    summary.usage.prompt_tokens,
                    summary.usage.completion_tokens
                );
                summary
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("Sheet '{}' failed: {}", sheet, message);
                SheetExtractionSummary::failed(sheet, message, elapsed_ms(started))
            }
        }
    }

    async fn try_run_sheet(&self, sheet: &str) -> anyhow::Result<SheetExtractionSummary> {
        let rows = self
            .read_rows(sheet)
            .await
            .with_context(|| format!("Failed to read sheet '{}'", sheet))?;

        let (metadata, table) = prepare_metadata(&*self.locator, sheet, rows)
            .await
            .context("Failed to prepare sheet metadata")?;
        self.store
            .save(&ArtifactKey::metadata(sheet), &metadata)
            .map_err(PipelineError::store)
            .context("Failed to persist sheet metadata")?;

        let extractor = ChunkExtractor::new(
            self.oracle.clone(),
            Arc::clone(&self.store),
            self.config.extractor.clone(),
        );

        let (run, reconcile_usage, merge_source) = match self.config.extractor.strategy {
            StitchStrategy::Forward => {
                let run = SequentialChunkRunner::new(extractor)
                    .run(&table)
                    .await
                    .context("Chunk extraction failed")?;
                (run, TokenUsage::default(), MergeSource::Chunks)
            }
            StitchStrategy::Reconcile => {
                let run = ConcurrentChunkRunner::new(extractor)
                    .run(&table)
                    .await
                    .context("Chunk extraction failed")?;
                let report = self
                    .reconciler()
                    .reconcile(sheet, &run.processed)
                    .await
                    .context("Boundary reconciliation failed")?;
                (run, report.usage, MergeSource::Reconciled)
            }
        };

        let record = merge_sheet(
            &*self.store,
            sheet,
            &table.context_text,
            &table.header_text,
            &run.processed,
            merge_source,
        )
        .context("Failed to merge sheet")?;

        Ok(SheetExtractionSummary {
            sheet_name: sheet.to_string(),
            usage: metadata.usage + run.usage + reconcile_usage,
            elapsed_ms: 0,
            chunks_planned: run.ranges.len(),
            chunks_processed: run.processed.len(),
            records: record.records.len(),
            stopped_early_after: run.stopped_early_after(),
            error: None,
        })
    }

    fn reconciler(&self) -> BoundaryReconciler<P, S> {
        BoundaryReconciler::new(
            self.oracle.clone(),
            Arc::clone(&self.store),
            self.config.extractor.boundary_concurrency,
        )
    }

    /// Run every sheet of the source
    ///
    /// A source whose sheet list cannot be read yields an `error` summary.
    pub async fn run_workbook(self: &Arc<Self>, label: &str) -> WorkbookExtractionSummary {
        let started = Instant::now();

        let names = match self.sheet_names().await {
            Ok(names) => names,
            Err(e) => {
                error!("Workbook '{}' could not be read: {}", label, e);
                return WorkbookExtractionSummary::workbook_error(
                    label,
                    e.to_string(),
                    elapsed_ms(started),
                );
            }
        };

        self.run_sheets_since(label, names, started).await
    }

    /// Run the named sheets, in the given order
    pub async fn run_sheets(
        self: &Arc<Self>,
        label: &str,
        sheets: Vec<String>,
    ) -> WorkbookExtractionSummary {
        self.run_sheets_since(label, sheets, Instant::now()).await
    }

    async fn run_sheets_since(
        self: &Arc<Self>,
        label: &str,
        sheets: Vec<String>,
        started: Instant,
    ) -> WorkbookExtractionSummary {
        let permits = self.config.sheet_concurrency.resolve();
        info!(
            "Workbook '{}': running {} sheet(s), {} at a time",
            label,
            sheets.len(),
            permits
        );

        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for (index, name) in sheets.iter().cloned().enumerate() {
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let summary = match semaphore.acquire_owned().await {
                    Ok(_permit) => pipeline.run_sheet(&name).await,
                    Err(e) => SheetExtractionSummary::failed(&name, e.to_string(), 0),
                };
                (index, summary)
            });
        }

        let mut results: Vec<Option<SheetExtractionSummary>> = sheets.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, summary)) => results[index] = Some(summary),
                Err(e) => warn!("Sheet task did not finish: {}", e),
            }
        }

        let summaries: Vec<SheetExtractionSummary> = results
            .into_iter()
            .zip(&sheets)
            .map(|(summary, name)| {
                summary.unwrap_or_else(|| {
                    SheetExtractionSummary::failed(name.as_str(), "Sheet task did not finish", 0)
                })
            })
            .collect();

        if self.config.combine_sheets {
            match self.combine(&summaries) {
                Ok(count) => info!("Workbook '{}': combined {} records", label, count),
                Err(e) => warn!("Workbook '{}': could not combine sheets: {}", label, e),
            }
        }

        let summary = WorkbookExtractionSummary::from_sheets(label, summaries, elapsed_ms(started));
        if let Err(e) = self.store.save(&ArtifactKey::run_summary(), &summary) {
            warn!("Workbook '{}': could not persist run summary: {}", label, e);
        }

        info!(
            "Workbook '{}' finished with status {} in {}ms ({} failed sheet(s))",
            label,
            summary.status,
            summary.elapsed_ms,
            summary.failures.len()
        );

        summary
    }

    /// Concatenate the records of successful sheets, in sheet order
    fn combine(&self, summaries: &[SheetExtractionSummary]) -> Result<usize, PipelineError> {
        let mut combined = Vec::new();

        for summary in summaries.iter().filter(|s| s.is_success()) {
            let key = ArtifactKey::sheet_record(&summary.sheet_name);
            match self.store.load::<SheetRecord>(&key) {
                Ok(Some(sheet)) => {
                    combined.extend(sheet.records.into_iter().map(|record| SheetTaggedRecord {
                        sheet_name: summary.sheet_name.clone(),
                        record,
                    }))
                }
                Ok(None) => warn!("Missing {}", key),
                Err(e) => warn!("Could not read {}: {}", key, e),
            }
        }

        self.store
            .save(&ArtifactKey::combined(), &combined)
            .map_err(PipelineError::store)?;
        Ok(combined.len())
    }

    async fn sheet_names(&self) -> Result<Vec<String>, PipelineError> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.sheet_names().map_err(|e| e.to_string()))
            .await
            .map_err(|e| PipelineError::Source(format!("Reader task failed: {}", e)))?
            .map_err(PipelineError::Source)
    }

    async fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, PipelineError> {
        let source = Arc::clone(&self.source);
        let name = sheet.to_string();
        tokio::task::spawn_blocking(move || source.read_rows(&name).map_err(|e| e.to_string()))
            .await
            .map_err(|e| PipelineError::Source(format!("Reader task failed: {}", e)))?
            .map_err(PipelineError::Source)
    }
}

/// Reconcile and re-merge a sheet from previously persisted artifacts
///
/// Reads the sheet's chunk plan and metadata from `store`, runs the
/// [`BoundaryReconciler`] and rewrites the sheet record from the reconciled
/// artifacts. Only planned ranges the saved sheet record was merged from
/// take part, so a forward run that stopped early never pulls in artifacts
/// of ranges it skipped. Without a saved sheet record every planned range
/// is used.
pub async fn reconcile_saved_sheet<P, S>(
    oracle: OracleClient<P>,
    store: Arc<S>,
    sheet: &str,
    limit: ConcurrencyLimit,
) -> Result<(ReconcileReport, SheetRecord), PipelineError>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
    S: ArtifactStore + Send + Sync + 'static,
    S::Error: Display,
{
    let ranges: Vec<RowRange> = store
        .load(&ArtifactKey::chunk_plan(sheet))
        .map_err(PipelineError::store)?
        .ok_or_else(|| PipelineError::Store(format!("No chunk plan for sheet '{}'", sheet)))?;
    let metadata: SheetMetadata = store
        .load(&ArtifactKey::metadata(sheet))
        .map_err(PipelineError::store)?
        .unwrap_or_default();
    let saved: Option<SheetRecord> = store
        .load(&ArtifactKey::sheet_record(sheet))
        .map_err(PipelineError::store)?;
    let ranges = match saved {
        Some(record) => {
            let merged: Vec<RowRange> = ranges
                .into_iter()
                .filter(|range| record.ranges.contains(range))
                .collect();
            info!(
                "Sheet '{}': reconciling the {} range(s) of the saved sheet record",
                sheet,
                merged.len()
            );
            merged
        }
        None => {
            warn!(
                "Sheet '{}': no saved sheet record, reconciling every planned range",
                sheet
            );
            ranges
        }
    };

    let report = BoundaryReconciler::new(oracle, Arc::clone(&store), limit)
        .reconcile(sheet, &ranges)
        .await?;
    let record = merge_sheet(
        &*store,
        sheet,
        &metadata.context_text,
        &metadata.header_text,
        &ranges,
        MergeSource::Reconciled,
    )?;

    Ok((report, record))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
