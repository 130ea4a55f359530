//! Quarry Pipeline
//!
//! Runs whole sheets and workbooks: reads a table source, prepares sheet
//! metadata, drives chunk extraction, merges the results and aggregates a
//! run summary.
//!
//! # Overview
//!
//! - **Table sources**: spreadsheet files through calamine, or in-memory sheets
//! - **Metadata preparation**: row cleaning and header/context location
//! - **Sheet orchestration**: metadata → chunks → merge, failures captured per sheet
//! - **Workbook orchestration**: sheets run concurrently behind a bounded gate,
//!   token totals taken from successful sheets only
//!
//! # Usage
//!
//! ```no_run
//! use quarry_pipeline::{CalamineWorkbook, OracleHeaderLocator, Pipeline, PipelineConfig};
//! use quarry_llm::{OpenAiProvider, OracleClient, RetryPolicy};
//! use quarry_store::JsonDirStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let oracle = OracleClient::new(OpenAiProvider::from_env()?, RetryPolicy::default());
//!     let workbook = CalamineWorkbook::open("bill_of_quantities.xlsx")?;
//!     let store = JsonDirStore::new(format!("outputs/{}", workbook.label()))?;
//!     let locator = OracleHeaderLocator::from_config(oracle.clone(), &config);
//!
//!     let label = workbook.label();
//!     let pipeline = Arc::new(Pipeline::new(
//!         oracle,
//!         Arc::new(store),
//!         Arc::new(workbook),
//!         Arc::new(locator),
//!         config,
//!     ));
//!
//!     let summary = pipeline.run_workbook(&label).await;
//!     println!("{}", summary.summary());
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! header_scan_rows = 20
//! header_match_threshold = 0.7
//! combine_sheets = true
//!
//! [extractor]
//! chunk_size = 30
//! strategy = "forward"
//!
//! [sheet_concurrency]
//! multiplier = 2
//! min = 2
//! max = 20
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod metadata;
mod pipeline;
mod source;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use metadata::{
    clean_rows, match_header, prepare_metadata, similarity, FixedHeaderLocator, HeaderLocator,
    OracleHeaderLocator,
};
pub use pipeline::{reconcile_saved_sheet, Pipeline};
pub use source::{CalamineWorkbook, StaticWorkbook};
