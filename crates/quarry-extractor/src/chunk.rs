//! Chunk extraction
//!
//! One oracle call per row range. In forward mode the last block of every
//! chunk stays open and travels to the next chunk in the
//! [`ContinuationState`]; the oracle re-emits it there, extended with any
//! continuation rows, so each block is persisted exactly once.

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::parser::BlockExtraction;
use crate::prompt::PromptBuilder;
use crate::render::render_table;
use quarry_domain::traits::{ArtifactStore, LlmProvider};
use quarry_domain::{
    ArtifactKey, ChunkResult, ContinuationState, ProductBlock, RawRows, RowRange, SheetTable,
    TokenUsage,
};
use quarry_llm::{LlmError, OracleClient, OracleOutcome};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a range sits in its sheet's plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPosition {
    /// First range of the sheet (no continuation is sent)
    pub is_first: bool,
    /// Last range of the sheet (the open block is flushed)
    pub is_last: bool,
}

impl ChunkPosition {
    /// Position of range `index` out of `count`
    pub fn of(index: usize, count: usize) -> Self {
        Self {
            is_first: index == 0,
            is_last: index + 1 >= count,
        }
    }

    /// A sheet made of a single chunk
    pub fn only() -> Self {
        Self {
            is_first: true,
            is_last: true,
        }
    }
}

/// What one forward chunk step produced
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    /// State to hand to the next chunk
    pub state: ContinuationState,
    /// Tokens spent on this chunk
    pub usage: TokenUsage,
    /// The persisted result
    pub result: ChunkResult,
    /// Blocks the oracle returned (open block included)
    pub block_count: usize,
}

/// Split the oracle's blocks into closed blocks and the next continuation state
///
/// The last block stays open unless `is_last`. When the oracle returned no
/// blocks at all, any carried open block is flushed into the closed list and
/// nothing is left open.
pub fn split_open_block(
    mut blocks: Vec<ProductBlock>,
    carried: ContinuationState,
    is_last: bool,
) -> (Vec<ProductBlock>, ContinuationState) {
    let Some(open) = blocks.pop() else {
        let ContinuationState {
            section_context,
            open_block,
        } = carried;
        return (
            open_block.into_iter().collect(),
            ContinuationState::closed(section_context),
        );
    };

    if is_last {
        let section_context = open.section_context.clone();
        blocks.push(open);
        (blocks, ContinuationState::closed(section_context))
    } else {
        (blocks, ContinuationState::carrying(open))
    }
}

/// Extracts product blocks from one row range at a time
pub struct ChunkExtractor<P, S> {
    oracle: OracleClient<P>,
    store: Arc<S>,
    config: ExtractorConfig,
}

impl<P, S> Clone for ChunkExtractor<P, S> {
    fn clone(&self) -> Self {
        Self {
            oracle: self.oracle.clone(),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<P, S> ChunkExtractor<P, S>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
    S: ArtifactStore,
    S::Error: Display,
{
    /// Create a new chunk extractor
    pub fn new(oracle: OracleClient<P>, store: Arc<S>, config: ExtractorConfig) -> Self {
        Self {
            oracle,
            store,
            config,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Artifact store in use
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Oracle client in use
    pub fn oracle(&self) -> &OracleClient<P> {
        &self.oracle
    }

    /// Extract one range, threading continuation state
    ///
    /// Persists the closed records as the chunk artifact (and, when
    /// configured, as the boundary seed) and returns the state for the next
    /// range. A parse failure is recorded on the chunk result and treated
    /// like a reply with no blocks.
    pub async fn extract_chunk(
        &self,
        table: &SheetTable,
        range: RowRange,
        carried: ContinuationState,
        position: ChunkPosition,
    ) -> Result<ChunkOutcome, ExtractorError> {
        let rows = slice_rows(table, range)?;
        let markdown = render_table(&table.header_text, rows);

        let mut builder = PromptBuilder::new(&markdown)
            .with_custom_instructions(self.config.custom_instructions.as_deref());
        if !position.is_first {
            builder = builder.with_continuation(&carried);
        }

        info!(
            "Extracting rows {} of sheet '{}' (open block carried: {})",
            range,
            table.sheet_name,
            !position.is_first && carried.has_open_block()
        );

        let reply = self
            .oracle
            .infer_as::<BlockExtraction>(&builder.system(), &builder.payload())
            .await?;

        let (blocks, parse_failure) = match reply.outcome {
            OracleOutcome::Parsed(extraction) => (extraction.blocks, None),
            OracleOutcome::ParseFailure { reason, .. } => {
                warn!(
                    "Rows {} of sheet '{}' returned an unparseable reply: {}",
                    range, table.sheet_name, reason
                );
                (Vec::new(), Some(reason))
            }
        };
        let block_count = blocks.len();

        let (closed, state) = split_open_block(blocks, carried, position.is_last);
        let records = closed
            .into_iter()
            .flat_map(ProductBlock::into_records)
            .collect::<Vec<_>>();

        debug!(
            "Rows {}: {} blocks returned, {} records closed, open block: {}",
            range,
            block_count,
            records.len(),
            state.has_open_block()
        );

        let result = ChunkResult {
            sheet_name: table.sheet_name.clone(),
            context: table.context_text.clone(),
            records,
            raw_rows: RawRows {
                range,
                rows: rows.to_vec(),
            },
            usage: reply.usage,
            parse_failure,
        };

        self.store
            .save(&ArtifactKey::chunk(&table.sheet_name, range), &result)
            .map_err(ExtractorError::store)?;
        if self.config.persist_boundary_seed {
            self.store
                .save(&ArtifactKey::boundary(&table.sheet_name, range), &result)
                .map_err(ExtractorError::store)?;
        }

        Ok(ChunkOutcome {
            state,
            usage: reply.usage,
            result,
            block_count,
        })
    }

    /// Extract one range on its own, without continuation state
    ///
    /// Every block is closed. Variants the oracle flags as missing their
    /// block description are kept as boundary-only records for the
    /// [`BoundaryReconciler`](crate::BoundaryReconciler). The result is
    /// persisted as the chunk artifact and as the boundary seed the
    /// reconciler starts from, whatever `persist_boundary_seed` says.
    pub async fn extract_standalone(
        &self,
        table: &SheetTable,
        range: RowRange,
    ) -> Result<ChunkResult, ExtractorError> {
        let rows = slice_rows(table, range)?;
        let markdown = render_table(&table.header_text, rows);
        let builder = PromptBuilder::new(&markdown)
            .standalone()
            .with_custom_instructions(self.config.custom_instructions.as_deref());

        info!(
            "Extracting rows {} of sheet '{}' independently",
            range, table.sheet_name
        );

        let reply = self
            .oracle
            .infer_as::<BlockExtraction>(&builder.system(), &builder.payload())
            .await?;

        let (blocks, parse_failure) = match reply.outcome {
            OracleOutcome::Parsed(extraction) => (extraction.blocks, None),
            OracleOutcome::ParseFailure { reason, .. } => (Vec::new(), Some(reason)),
        };

        let result = ChunkResult {
            sheet_name: table.sheet_name.clone(),
            context: table.context_text.clone(),
            records: blocks
                .into_iter()
                .flat_map(ProductBlock::into_records)
                .collect(),
            raw_rows: RawRows {
                range,
                rows: rows.to_vec(),
            },
            usage: reply.usage,
            parse_failure,
        };

        self.store
            .save(&ArtifactKey::chunk(&table.sheet_name, range), &result)
            .map_err(ExtractorError::store)?;
        // Always written, so no boundary artifact from an earlier run of this
        // range outlives a fresh extraction
        self.store
            .save(&ArtifactKey::boundary(&table.sheet_name, range), &result)
            .map_err(ExtractorError::store)?;

        Ok(result)
    }
}

fn slice_rows(table: &SheetTable, range: RowRange) -> Result<&[Vec<String>], ExtractorError> {
    table
        .rows
        .get(range.as_range())
        .ok_or(ExtractorError::RangeOutOfBounds {
            range,
            rows: table.rows.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_domain::ProductVariant;

    fn block(context: &str, descriptions: &[&str]) -> ProductBlock {
        ProductBlock {
            section_context: context.to_string(),
            is_group: descriptions.len() > 1,
            variants: descriptions
                .iter()
                .map(|d| ProductVariant {
                    full_product_description: d.to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_last_block_stays_open() {
        let (closed, state) = split_open_block(
            vec![block("Valves", &["a"]), block("Pipes", &["b", "c"])],
            ContinuationState::empty(),
            false,
        );
        assert_eq!(closed, vec![block("Valves", &["a"])]);
        assert_eq!(state.section_context, "Pipes");
        assert_eq!(state.open_block, Some(block("Pipes", &["b", "c"])));
    }

    #[test]
    fn test_last_chunk_flushes_open_block() {
        let (closed, state) =
            split_open_block(vec![block("Pipes", &["b"])], ContinuationState::empty(), true);
        assert_eq!(closed.len(), 1);
        assert!(!state.has_open_block());
        assert_eq!(state.section_context, "Pipes");
    }

    #[test]
    fn test_zero_blocks_keeps_section_and_flushes_carried_block() {
        let carried = ContinuationState::carrying(block("Pipes", &["b"]));
        let (closed, state) = split_open_block(Vec::new(), carried, false);
        assert_eq!(closed, vec![block("Pipes", &["b"])]);
        assert_eq!(state, ContinuationState::closed("Pipes"));
    }

    #[test]
    fn test_zero_blocks_with_nothing_carried() {
        let (closed, state) =
            split_open_block(Vec::new(), ContinuationState::closed("Earthworks"), false);
        assert!(closed.is_empty());
        assert_eq!(state, ContinuationState::closed("Earthworks"));
    }

    #[test]
    fn test_chunk_position() {
        assert_eq!(ChunkPosition::of(0, 1), ChunkPosition::only());
        let middle = ChunkPosition::of(1, 3);
        assert!(!middle.is_first && !middle.is_last);
        assert!(ChunkPosition::of(2, 3).is_last);
    }
}
