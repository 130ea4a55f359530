//! Quarry Domain Layer
//!
//! Core value types and collaborator traits for turning large, irregular
//! spreadsheets into structured product records with an LLM oracle.
//! Infrastructure (oracle clients, stores, table sources) lives in other
//! crates and plugs in through the traits defined here.
//!
//! ## Key Concepts
//!
//! - **RowRange**: a half-open slice of a sheet's data rows, produced by [`plan`]
//! - **ProductBlock / ProductVariant**: what the oracle extracts from a chunk
//! - **ContinuationState**: the open block and section context carried from
//!   one chunk to the next
//! - **ChunkResult**: persisted closed records of one chunk
//! - **Summaries**: per-sheet and per-workbook outcomes with token totals
//!
//! ## Architecture
//!
//! - Only `serde` and `uuid` as external dependencies
//! - No I/O; every external interaction goes through a trait

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod chunk;
pub mod continuation;
pub mod product;
pub mod range;
pub mod sheet;
pub mod summary;
pub mod traits;

// Re-exports for convenience
pub use artifact::{safe_name, ArtifactKey, ArtifactKind};
pub use chunk::{ChunkResult, RawRows};
pub use continuation::ContinuationState;
pub use product::{ProductBlock, ProductRecord, ProductVariant, SpecPair};
pub use range::{plan, PlanError, RowRange};
pub use sheet::{SheetMetadata, SheetRecord, SheetTable, SheetTaggedRecord};
pub use summary::{
    RunStatus, SheetExtractionSummary, SheetFailure, TokenUsage, WorkbookExtractionSummary,
};
pub use traits::{ArtifactStore, Completion, LlmProvider, TableSource};
