//! Boundary reconciliation
//!
//! Repairs records split across adjacent chunks after independent
//! extraction. Each adjacent pair `(c, c + 1)` is an independent unit of
//! work: the tail record of `c` and the boundary-only records of `c + 1`
//! go to the oracle, which returns the completed records. Pairs run
//! concurrently behind a [`ConcurrencyLimit`]; rewriting the chunks is a
//! separate deterministic pass over the collected outcomes, so no two
//! tasks ever write the same artifact.
//!
//! Reconciled chunks carry no boundary-only records, so running the
//! reconciler again over its own output changes nothing.

use crate::error::ExtractorError;
use crate::gate::ConcurrencyLimit;
use crate::merge::load_chunk;
use crate::parser::MergeReply;
use crate::prompt::{merge_payload, MERGE_INSTRUCTIONS};
use quarry_domain::traits::{ArtifactStore, LlmProvider};
use quarry_domain::{ArtifactKey, ChunkResult, ProductRecord, RowRange, TokenUsage};
use quarry_llm::{LlmError, OracleClient, OracleOutcome};
use std::fmt::Display;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// What happened to one adjacent pair
#[derive(Debug, Clone, PartialEq)]
pub enum PairStatus {
    /// The oracle completed the boundary records
    Merged(Vec<ProductRecord>),
    /// Nothing to merge (no boundary-only records, or a chunk was missing)
    Skipped,
    /// The merge call failed or returned nothing usable
    Failed(String),
}

/// Outcome of one pair task
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    /// Index of the left chunk
    pub index: usize,
    /// What happened
    pub status: PairStatus,
    /// Tokens spent on the pair
    pub usage: TokenUsage,
}

impl PairOutcome {
    fn skipped(index: usize) -> Self {
        Self {
            index,
            status: PairStatus::Skipped,
            usage: TokenUsage::default(),
        }
    }

    fn failed(index: usize, reason: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            index,
            status: PairStatus::Failed(reason.into()),
            usage,
        }
    }

    fn merged_records(&self) -> Option<&[ProductRecord]> {
        match &self.status {
            PairStatus::Merged(records) => Some(records),
            _ => None,
        }
    }
}

/// A pair that could not be reconciled
#[derive(Debug, Clone, PartialEq)]
pub struct PairFailure {
    /// Left range
    pub left: RowRange,
    /// Right range
    pub right: RowRange,
    /// Reason
    pub error: String,
}

/// Summary of a reconciliation pass over one sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Adjacent pairs considered
    pub pairs: usize,
    /// Pairs merged
    pub merged: usize,
    /// Pairs with nothing to merge
    pub skipped: usize,
    /// Pairs that failed; their chunks keep their records
    pub failures: Vec<PairFailure>,
    /// Tokens spent on merge calls
    pub usage: TokenUsage,
    /// Ranges whose boundary artifact was rewritten
    pub rewritten: Vec<RowRange>,
}

/// Merges boundary-only records into the tail of the previous chunk
pub struct BoundaryReconciler<P, S> {
    oracle: OracleClient<P>,
    store: Arc<S>,
    limit: ConcurrencyLimit,
}

impl<P, S> BoundaryReconciler<P, S>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
    S: ArtifactStore + Send + Sync + 'static,
    S::Error: Display,
{
    /// Create a reconciler
    pub fn new(oracle: OracleClient<P>, store: Arc<S>, limit: ConcurrencyLimit) -> Self {
        Self {
            oracle,
            store,
            limit,
        }
    }

    /// Reconcile every adjacent pair of `ranges` on `sheet`
    pub async fn reconcile(
        &self,
        sheet: &str,
        ranges: &[RowRange],
    ) -> Result<ReconcileReport, ExtractorError> {
        let mut report = ReconcileReport::default();
        if ranges.len() < 2 {
            return Ok(report);
        }
        report.pairs = ranges.len() - 1;

        let chunks: Arc<Vec<Option<ChunkResult>>> = Arc::new(
            ranges
                .iter()
                .map(|range| load_chunk(&*self.store, sheet, *range, true))
                .collect(),
        );

        let permits = self.limit.resolve();
        info!(
            "Sheet '{}': reconciling {} boundary pair(s), {} at a time",
            sheet, report.pairs, permits
        );

        let semaphore = self.limit.semaphore();
        let mut tasks = JoinSet::new();
        for index in 0..report.pairs {
            let oracle = self.oracle.clone();
            let chunks = Arc::clone(&chunks);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return PairOutcome::failed(index, "Concurrency gate closed", TokenUsage::default());
                };
                merge_pair(&oracle, index, &chunks).await
            });
        }

        let mut outcomes: Vec<Option<PairOutcome>> = (0..report.pairs).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    let index = outcome.index;
                    outcomes[index] = Some(outcome);
                }
                Err(e) => warn!("Boundary pair task did not finish: {}", e),
            }
        }

        let outcomes: Vec<PairOutcome> = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| {
                outcome.unwrap_or_else(|| {
                    PairOutcome::failed(index, "Pair task did not finish", TokenUsage::default())
                })
            })
            .collect();

        for outcome in &outcomes {
            report.usage += outcome.usage;
            match &outcome.status {
                PairStatus::Merged(_) => report.merged += 1,
                PairStatus::Skipped => report.skipped += 1,
                PairStatus::Failed(error) => report.failures.push(PairFailure {
                    left: ranges[outcome.index],
                    right: ranges[outcome.index + 1],
                    error: error.clone(),
                }),
            }
        }

        report.rewritten = self.apply(sheet, ranges, &chunks, &outcomes)?;

        info!(
            "Sheet '{}': {} merged, {} skipped, {} failed, {} chunk(s) rewritten",
            sheet,
            report.merged,
            report.skipped,
            report.failures.len(),
            report.rewritten.len()
        );

        Ok(report)
    }

    /// Rewrite chunks touched by a merged pair
    ///
    /// Chunk `c` loses its boundary-only records when pair `c - 1` merged,
    /// and loses its tail record in favor of the merged records when pair
    /// `c` merged.
    fn apply(
        &self,
        sheet: &str,
        ranges: &[RowRange],
        chunks: &[Option<ChunkResult>],
        outcomes: &[PairOutcome],
    ) -> Result<Vec<RowRange>, ExtractorError> {
        let mut rewritten = Vec::new();

        for (c, chunk) in chunks.iter().enumerate() {
            let Some(chunk) = chunk else { continue };

            let previous_merged = c > 0 && outcomes[c - 1].merged_records().is_some();
            let completed = outcomes.get(c).and_then(PairOutcome::merged_records);
            if !previous_merged && completed.is_none() {
                continue;
            }

            let tail = chunk.records.len().checked_sub(1);
            let mut records: Vec<ProductRecord> = chunk
                .records
                .iter()
                .enumerate()
                .filter(|(i, record)| {
                    let absorbed_upstream = previous_merged && record.is_boundary_only();
                    let replaced_tail = completed.is_some() && Some(*i) == tail;
                    !absorbed_upstream && !replaced_tail
                })
                .map(|(_, record)| record.clone())
                .collect();
            if let Some(completed) = completed {
                records.extend_from_slice(completed);
            }

            let updated = ChunkResult {
                records,
                ..chunk.clone()
            };
            self.store
                .save(&ArtifactKey::boundary(sheet, ranges[c]), &updated)
                .map_err(ExtractorError::store)?;
            rewritten.push(ranges[c]);
        }

        Ok(rewritten)
    }
}

async fn merge_pair<P>(
    oracle: &OracleClient<P>,
    index: usize,
    chunks: &[Option<ChunkResult>],
) -> PairOutcome
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
{
    let (Some(left), Some(right)) = (&chunks[index], &chunks[index + 1]) else {
        return PairOutcome::skipped(index);
    };
    let Some(tail) = left.last_record() else {
        return PairOutcome::skipped(index);
    };
    let incomplete = right.boundary_only_records();
    if incomplete.is_empty() {
        return PairOutcome::skipped(index);
    }

    debug!(
        "Merging {} boundary record(s) of rows {} into the tail of rows {}",
        incomplete.len(),
        right.range(),
        left.range()
    );

    let reply = match oracle
        .infer_as::<MergeReply>(MERGE_INSTRUCTIONS, &merge_payload(tail, &incomplete))
        .await
    {
        Ok(reply) => reply,
        Err(failure) => {
            warn!("Boundary merge of rows {} failed: {}", left.range(), failure);
            return PairOutcome::failed(index, failure.to_string(), TokenUsage::default());
        }
    };

    match reply.outcome {
        OracleOutcome::Parsed(merge) if !merge.products.is_empty() => PairOutcome {
            index,
            status: PairStatus::Merged(
                merge
                    .products
                    .into_iter()
                    .map(|mut variant| {
                        variant.boundary_only = false;
                        ProductRecord {
                            section_context: tail.section_context.clone(),
                            variant,
                        }
                    })
                    .collect(),
            ),
            usage: reply.usage,
        },
        OracleOutcome::Parsed(_) => {
            PairOutcome::failed(index, "Merge returned no products", reply.usage)
        }
        OracleOutcome::ParseFailure { reason, .. } => {
            PairOutcome::failed(index, reason, reply.usage)
        }
    }
}
