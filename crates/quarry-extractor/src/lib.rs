//! Quarry Extractor
//!
//! Turns the data rows of one sheet into product records, one bounded chunk
//! of rows per oracle call.
//!
//! # Overview
//!
//! A sheet is planned into contiguous row ranges. Each range is rendered as
//! a Markdown table under the sheet's header and sent to the oracle, which
//! returns product blocks. Blocks that straddle a chunk boundary are
//! stitched back together by one of two strategies:
//!
//! - **Forward**: the trailing block of each chunk is kept open and handed
//!   to the next chunk, which re-emits it with any continuation rows.
//!   Strictly sequential within a sheet.
//! - **Reconcile**: chunks are extracted independently, flagging rows that
//!   lack their block description; afterwards each adjacent pair is merged
//!   by a separate oracle call. Pairs run concurrently.
//!
//! # Architecture
//!
//! ```text
//! SheetTable ─► plan ─► SequentialChunkRunner ──► chunk artifacts ─► merge_sheet ─► SheetRecord
//!                  └──► ConcurrentChunkRunner ──► chunk artifacts
//!                                                      │
//!                                             BoundaryReconciler
//!                                                      │
//!                                            boundary artifacts ─► merge_sheet
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use quarry_extractor::{ChunkExtractor, ExtractorConfig, SequentialChunkRunner};
//! use quarry_domain::SheetTable;
//! use quarry_llm::{MockProvider, OracleClient, RetryPolicy};
//! use quarry_store::MemoryArtifactStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let oracle = OracleClient::new(MockProvider::default(), RetryPolicy::default());
//! let store = Arc::new(MemoryArtifactStore::new());
//! let extractor = ChunkExtractor::new(oracle, store, ExtractorConfig::default());
//!
//! let table = SheetTable {
//!     sheet_name: "Bill 1".to_string(),
//!     header_text: "Item | Description | Unit | Qty".to_string(),
//!     ..Default::default()
//! };
//!
//! let run = SequentialChunkRunner::new(extractor).run(&table).await?;
//! println!("{} records from {} chunks", run.records, run.processed.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod boundary;
mod chunk;
mod config;
mod error;
mod gate;
mod merge;
mod parser;
mod runner;

pub mod prompt;
pub mod render;

#[cfg(test)]
mod tests;

pub use boundary::{BoundaryReconciler, PairFailure, PairOutcome, PairStatus, ReconcileReport};
pub use chunk::{split_open_block, ChunkExtractor, ChunkOutcome, ChunkPosition};
pub use config::{ExtractorConfig, StitchStrategy};
pub use error::ExtractorError;
pub use gate::ConcurrencyLimit;
pub use merge::{load_chunk, merge_sheet, MergeSource};
pub use parser::{BlockExtraction, HeaderReply, MergeReply};
pub use runner::{ConcurrentChunkRunner, RunnerState, SequentialChunkRunner, SheetRun, Termination};
