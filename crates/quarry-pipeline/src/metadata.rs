//! Sheet metadata preparation
//!
//! Locates the header block and the context rows above it, and decides
//! which rows and columns hold data.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use quarry_domain::traits::LlmProvider;
use quarry_domain::{SheetMetadata, SheetTable, TokenUsage};
use quarry_extractor::prompt::{header_payload, HEADER_INSTRUCTIONS};
use quarry_extractor::render::{render_preview, row_line};
use quarry_extractor::HeaderReply;
use quarry_llm::{LlmError, OracleClient, OracleOutcome};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Finds the header and context rows of a cleaned sheet
#[async_trait]
pub trait HeaderLocator: Send + Sync {
    /// Locate the header block of `rows`
    async fn locate(&self, sheet: &str, rows: &[Vec<String>]) -> Result<SheetMetadata, PipelineError>;
}

/// Asks the oracle which leading rows are context and which are the header
pub struct OracleHeaderLocator<P> {
    oracle: OracleClient<P>,
    scan_rows: usize,
    threshold: f64,
}

impl<P> OracleHeaderLocator<P>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
{
    /// Create a locator
    pub fn new(oracle: OracleClient<P>, scan_rows: usize, threshold: f64) -> Self {
        Self {
            oracle,
            scan_rows,
            threshold,
        }
    }

    /// Create a locator with the scan window and threshold of `config`
    pub fn from_config(oracle: OracleClient<P>, config: &PipelineConfig) -> Self {
        Self::new(oracle, config.header_scan_rows, config.header_match_threshold)
    }
}

#[async_trait]
impl<P> HeaderLocator for OracleHeaderLocator<P>
where
    P: LlmProvider<Error = LlmError> + Send + Sync + 'static,
{
    async fn locate(&self, sheet: &str, rows: &[Vec<String>]) -> Result<SheetMetadata, PipelineError> {
        let preview = render_preview(rows, self.scan_rows);
        let reply = self
            .oracle
            .infer_as::<HeaderReply>(HEADER_INSTRUCTIONS, &header_payload(&preview))
            .await?;

        let located = match reply.outcome {
            OracleOutcome::Parsed(header) => header,
            OracleOutcome::ParseFailure { reason, .. } => {
                warn!(
                    "Sheet '{}': header reply could not be parsed ({}), treating the sheet as headerless",
                    sheet, reason
                );
                HeaderReply::default()
            }
        };

        let mut metadata = match_header(
            sheet,
            rows,
            &located.header_rows,
            self.scan_rows,
            self.threshold,
        )?;
        metadata.context_text = located.context_rows;
        metadata.usage = reply.usage;
        Ok(metadata)
    }
}

/// Uses a known header row
#[derive(Debug, Clone, Copy)]
pub struct FixedHeaderLocator {
    header_row: usize,
}

impl FixedHeaderLocator {
    /// Header at `header_row` (0-based, in cleaned rows)
    pub fn new(header_row: usize) -> Self {
        Self { header_row }
    }
}

#[async_trait]
impl HeaderLocator for FixedHeaderLocator {
    async fn locate(&self, sheet: &str, rows: &[Vec<String>]) -> Result<SheetMetadata, PipelineError> {
        let header = rows
            .get(self.header_row)
            .ok_or_else(|| PipelineError::HeaderNotFound {
                sheet: sheet.to_string(),
            })?;

        let context_text = rows[..self.header_row]
            .iter()
            .map(|row| row_line(row))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(SheetMetadata {
            sheet_name: sheet.to_string(),
            header_text: row_line(header),
            context_text,
            data_start_row: self.header_row + 1,
            max_column: populated_width(header),
            total_rows: rows.len() - self.header_row - 1,
            usage: TokenUsage::default(),
        })
    }
}

/// Replace line breaks with spaces, trim cells, and drop empty rows
pub fn clean_rows(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| cell.replace(['\r', '\n'], " ").trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect()
}

/// Clean raw rows, locate the header, and build the sheet's data table
pub async fn prepare_metadata<L>(
    locator: &L,
    sheet: &str,
    raw_rows: Vec<Vec<String>>,
) -> Result<(SheetMetadata, SheetTable), PipelineError>
where
    L: HeaderLocator + ?Sized,
{
    let cleaned = clean_rows(raw_rows);
    let metadata = locator.locate(sheet, &cleaned).await?;
    let table = SheetTable::from_metadata(&metadata, &cleaned);

    info!(
        "Sheet '{}': data starts at row {}, {} columns, {} data rows",
        sheet,
        metadata.data_start_row,
        metadata.max_column,
        table.len()
    );

    Ok((metadata, table))
}

/// Find the header block in `rows` by line similarity
///
/// An empty header means the sheet has none: data starts at row 0 and the
/// width is the most common populated row width. Otherwise every candidate
/// start within the scan window is scored by the average similarity of its
/// rows to the header lines; the best score at or above `threshold` wins.
pub fn match_header(
    sheet: &str,
    rows: &[Vec<String>],
    header_text: &str,
    scan_rows: usize,
    threshold: f64,
) -> Result<SheetMetadata, PipelineError> {
    let header_lines: Vec<&str> = header_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if header_lines.is_empty() {
        return Ok(SheetMetadata {
            sheet_name: sheet.to_string(),
            header_text: String::new(),
            context_text: String::new(),
            data_start_row: 0,
            max_column: modal_width(rows),
            total_rows: rows.len(),
            usage: TokenUsage::default(),
        });
    }

    let span = header_lines.len();
    let last_start = rows.len().saturating_sub(span).min(scan_rows);
    let mut best: Option<(usize, f64)> = None;

    for start in 0..=last_start {
        let window = &rows[start..(start + span).min(rows.len())];
        if window.len() < span {
            break;
        }
        let score = window
            .iter()
            .zip(&header_lines)
            .map(|(row, line)| similarity(&row_line(row), line))
            .sum::<f64>()
            / span as f64;

        if score >= threshold && best.map_or(true, |(_, b)| score > b) {
            best = Some((start, score));
        }
    }

    let (start, score) = best.ok_or_else(|| PipelineError::HeaderNotFound {
        sheet: sheet.to_string(),
    })?;
    debug!(
        "Sheet '{}': header matched at row {} (similarity {:.2})",
        sheet, start, score
    );

    let header_rows = &rows[start..start + span];
    let width = header_rows.iter().map(|r| populated_width(r)).max().unwrap_or(0);
    let data_start_row = start + span;

    Ok(SheetMetadata {
        sheet_name: sheet.to_string(),
        header_text: header_rows
            .iter()
            .map(|row| row_line(row))
            .collect::<Vec<_>>()
            .join("\n"),
        context_text: String::new(),
        data_start_row,
        max_column: if width > 0 { width } else { modal_width(rows) },
        total_rows: rows.len() - data_start_row,
        usage: TokenUsage::default(),
    })
}

/// Dice coefficient over character bigrams, case- and whitespace-insensitive
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }

    let left = bigrams(&a);
    let mut right = bigrams(&b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let total = left.len() + right.len();
    let mut overlap = 0;
    for pair in &left {
        if let Some(pos) = right.iter().position(|other| other == pair) {
            right.swap_remove(pos);
            overlap += 1;
        }
    }

    2.0 * overlap as f64 / total as f64
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn bigrams(text: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

fn populated_width(row: &[String]) -> usize {
    row.iter()
        .rposition(|cell| !cell.trim().is_empty())
        .map_or(0, |idx| idx + 1)
}

/// Most common populated width among rows, preferring the wider on ties
fn modal_width(rows: &[Vec<String>]) -> usize {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for width in rows.iter().map(|r| populated_width(r)).filter(|w| *w > 0) {
        *counts.entry(width).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(width, count)| (*count, *width))
        .map_or(0, |(width, _)| width)
}
