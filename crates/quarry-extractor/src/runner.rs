//! Sequential chunk runner
//!
//! Walks a sheet's planned ranges in order as an explicit state machine:
//!
//! ```text
//! AwaitingContext(0, empty)
//!     │ extract chunk i
//!     ├── i was the last range ─────────────► Terminal(Completed)
//!     ├── open block returned ──────────────► AwaitingContext(i + 1, state)
//!     └── nothing left open ────────────────► Terminal(StoppedEarly)
//! ```
//!
//! Stopping early is deliberate: when a chunk yields no open block the
//! extraction treats the rest of the sheet as non-product content.
//!
//! [`ConcurrentChunkRunner`] is the counterpart for the reconcile strategy:
//! ranges are extracted independently, behind a concurrency gate, and
//! stitched afterwards by the [`BoundaryReconciler`](crate::BoundaryReconciler).

use crate::chunk::{ChunkExtractor, ChunkOutcome, ChunkPosition};
use crate::error::ExtractorError;
use quarry_domain::traits::{ArtifactStore, LlmProvider};
use quarry_domain::{
    plan, ArtifactKey, ChunkResult, ContinuationState, RowRange, SheetTable, TokenUsage,
};
use quarry_llm::LlmError;
use std::fmt::Display;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Why a sheet run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every planned range was processed
    Completed,
    /// A chunk left no open block; later ranges were skipped
    StoppedEarly {
        /// Last range that was processed
        after: RowRange,
    },
    /// The sheet had no data rows
    NothingToDo,
}

/// State of the sequential runner
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerState {
    /// Ready to extract range `index` with the carried state
    AwaitingContext {
        /// Index into the planned ranges
        index: usize,
        /// State handed over by the previous chunk
        state: ContinuationState,
    },
    /// No further ranges will be processed
    Terminal(Termination),
}

impl RunnerState {
    /// Starting state for a sheet with `total` planned ranges
    pub fn start(total: usize) -> Self {
        if total == 0 {
            RunnerState::Terminal(Termination::NothingToDo)
        } else {
            RunnerState::AwaitingContext {
                index: 0,
                state: ContinuationState::empty(),
            }
        }
    }

    /// State after range `index` (covering `range`) returned `next`
    pub fn advance(index: usize, total: usize, range: RowRange, next: ContinuationState) -> Self {
        if index + 1 >= total {
            RunnerState::Terminal(Termination::Completed)
        } else if next.has_open_block() {
            RunnerState::AwaitingContext {
                index: index + 1,
                state: next,
            }
        } else {
            RunnerState::Terminal(Termination::StoppedEarly { after: range })
        }
    }
}

/// What a sequential sheet run did
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRun {
    /// Sheet identifier
    pub sheet_name: String,
    /// Every planned range
    pub ranges: Vec<RowRange>,
    /// Ranges that were extracted, in order
    pub processed: Vec<RowRange>,
    /// Tokens spent across processed chunks
    pub usage: TokenUsage,
    /// Records persisted across processed chunks
    pub records: usize,
    /// How the run ended
    pub termination: Termination,
    /// Ranges whose reply could not be parsed, with the reason
    pub parse_failures: Vec<(RowRange, String)>,
}

impl SheetRun {
    fn new(sheet_name: &str, ranges: Vec<RowRange>) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            ranges,
            processed: Vec::new(),
            usage: TokenUsage::default(),
            records: 0,
            termination: Termination::NothingToDo,
            parse_failures: Vec::new(),
        }
    }

    fn record(&mut self, range: RowRange, outcome: &ChunkOutcome) {
        self.record_result(range, &outcome.result);
    }

    fn record_result(&mut self, range: RowRange, result: &ChunkResult) {
        self.processed.push(range);
        self.usage += result.usage;
        self.records += result.records.len();
        if let Some(reason) = &result.parse_failure {
            self.parse_failures.push((range, reason.clone()));
        }
    }

    /// Last processed range when the run stopped early
    pub fn stopped_early_after(&self) -> Option<RowRange> {
        match self.termination {
            Termination::StoppedEarly { after } => Some(after),
            _ => None,
        }
    }
}

/// Runs a sheet's chunks one after another, threading continuation state
pub struct SequentialChunkRunner<P, S> {
    extractor: ChunkExtractor<P, S>,
}

impl<P, S> SequentialChunkRunner<P, S>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
    S: ArtifactStore,
    S::Error: Display,
{
    /// Create a runner around a chunk extractor
    pub fn new(extractor: ChunkExtractor<P, S>) -> Self {
        Self { extractor }
    }

    /// The wrapped extractor
    pub fn extractor(&self) -> &ChunkExtractor<P, S> {
        &self.extractor
    }

    /// Plan, persist the plan, and extract the sheet in order
    ///
    /// An oracle failure on any chunk fails the run; chunks already
    /// processed keep their artifacts.
    pub async fn run(&self, table: &SheetTable) -> Result<SheetRun, ExtractorError> {
        let ranges = plan_sheet(&self.extractor, table)?;

        let total = ranges.len();
        let mut run = SheetRun::new(&table.sheet_name, ranges);
        let mut current = RunnerState::start(total);

        loop {
            match current {
                RunnerState::Terminal(termination) => {
                    run.termination = termination;
                    break;
                }
                RunnerState::AwaitingContext { index, state } => {
                    let range = run.ranges[index];
                    let outcome = self
                        .extractor
                        .extract_chunk(table, range, state, ChunkPosition::of(index, total))
                        .await?;
                    run.record(range, &outcome);

                    current = RunnerState::advance(index, total, range, outcome.state);
                    if let RunnerState::Terminal(Termination::StoppedEarly { after }) = &current {
                        warn!(
                            "Sheet '{}': no open block after rows {}, skipping {} remaining chunk(s)",
                            table.sheet_name,
                            after,
                            total - index - 1
                        );
                    }
                }
            }
        }

        Ok(run)
    }
}

/// Extracts every range of a sheet independently, a bounded number at a time
pub struct ConcurrentChunkRunner<P, S> {
    extractor: ChunkExtractor<P, S>,
}

impl<P, S> ConcurrentChunkRunner<P, S>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
    S: ArtifactStore + Send + Sync + 'static,
    S::Error: Display,
{
    /// Create a runner around a chunk extractor
    pub fn new(extractor: ChunkExtractor<P, S>) -> Self {
        Self { extractor }
    }

    /// Plan, persist the plan, and extract every range
    ///
    /// The first failing range fails the run once all in-flight ranges have
    /// finished.
    pub async fn run(&self, table: &SheetTable) -> Result<SheetRun, ExtractorError> {
        let ranges = plan_sheet(&self.extractor, table)?;
        let total = ranges.len();
        let mut run = SheetRun::new(&table.sheet_name, ranges.clone());
        if total == 0 {
            return Ok(run);
        }

        let semaphore = self.extractor.config().boundary_concurrency.semaphore();
        let table = Arc::new(table.clone());
        let mut tasks = JoinSet::new();

        for (index, range) in ranges.iter().copied().enumerate() {
            let extractor = self.extractor.clone();
            let table = Arc::clone(&table);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ExtractorError::TaskJoin(e.to_string()))?;
                let result = extractor.extract_standalone(&table, range).await?;
                Ok::<_, ExtractorError>((index, result))
            });
        }

        let mut results: Vec<Option<ChunkResult>> = (0..total).map(|_| None).collect();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((index, result))) => results[index] = Some(result),
                Ok(Err(e)) => {
                    warn!("Sheet '{}': chunk extraction failed: {}", table.sheet_name, e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(ExtractorError::TaskJoin(e.to_string()));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        for (range, result) in ranges.iter().zip(results.iter().flatten()) {
            run.record_result(*range, result);
        }
        run.termination = Termination::Completed;
        Ok(run)
    }
}

fn plan_sheet<P, S>(
    extractor: &ChunkExtractor<P, S>,
    table: &SheetTable,
) -> Result<Vec<RowRange>, ExtractorError>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
    S: ArtifactStore,
    S::Error: Display,
{
    let ranges = plan(table.len(), extractor.config().chunk_size)?;
    extractor
        .store()
        .save(&ArtifactKey::chunk_plan(&table.sheet_name), &ranges)
        .map_err(ExtractorError::store)?;

    info!(
        "Sheet '{}': {} data rows planned into {} chunk(s)",
        table.sheet_name,
        table.len(),
        ranges.len()
    );
    Ok(ranges)
}
