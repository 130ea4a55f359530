//! Token usage and run summaries

use crate::range::RowRange;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Oracle token counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens sent to the oracle
    pub prompt_tokens: u64,
    /// Tokens produced by the oracle
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Create a usage record
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Prompt plus completion tokens
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = TokenUsage>>(iter: I) -> Self {
        iter.fold(TokenUsage::default(), Add::add)
    }
}

/// Outcome of one sheet's orchestration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetExtractionSummary {
    /// Sheet identifier
    pub sheet_name: String,
    /// Tokens spent on this sheet (metadata, chunks and reconciliation)
    pub usage: TokenUsage,
    /// Wall-clock time spent on the sheet in milliseconds
    pub elapsed_ms: u64,
    /// Ranges planned for the sheet
    pub chunks_planned: usize,
    /// Ranges actually sent to the oracle
    pub chunks_processed: usize,
    /// Records in the merged sheet output
    pub records: usize,
    /// Range after which the runner stopped threading state, if it stopped early
    pub stopped_early_after: Option<RowRange>,
    /// Failure reason; `None` on success
    pub error: Option<String>,
}

impl SheetExtractionSummary {
    /// Summary for a sheet that failed at any stage
    pub fn failed(sheet_name: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            elapsed_ms,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Whether the sheet completed without error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Terminal status of a workbook run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every sheet succeeded
    Success,
    /// At least one sheet failed
    PartialSuccess,
    /// The workbook itself could not be processed
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::PartialSuccess => write!(f, "partial_success"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

/// One entry of the workbook failure list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetFailure {
    /// Failed sheet
    pub sheet: String,
    /// Failure reason
    pub error: String,
}

/// Terminal artifact of one workbook run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbookExtractionSummary {
    /// UUIDv7 identifying the run
    pub run_id: String,
    /// Workbook label (usually the file name)
    pub workbook: String,
    /// Terminal status
    pub status: RunStatus,
    /// Token totals from successful sheets only
    pub usage: TokenUsage,
    /// Total wall-clock time in milliseconds
    pub elapsed_ms: u64,
    /// Per-sheet summaries in sheet order
    pub sheets: Vec<SheetExtractionSummary>,
    /// Failed sheets in sheet order
    pub failures: Vec<SheetFailure>,
    /// Workbook-level failure, set only when status is `Error`
    pub error: Option<String>,
}

impl WorkbookExtractionSummary {
    /// Aggregate per-sheet summaries
    ///
    /// Totals are computed from each sheet's own summary. Failed sheets
    /// contribute to the failure list but not to the token totals.
    pub fn from_sheets(
        workbook: impl Into<String>,
        sheets: Vec<SheetExtractionSummary>,
        elapsed_ms: u64,
    ) -> Self {
        let usage = sheets
            .iter()
            .filter(|s| s.is_success())
            .map(|s| s.usage)
            .sum();

        let failures: Vec<SheetFailure> = sheets
            .iter()
            .filter_map(|s| {
                s.error.as_ref().map(|error| SheetFailure {
                    sheet: s.sheet_name.clone(),
                    error: error.clone(),
                })
            })
            .collect();

        let status = if failures.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::PartialSuccess
        };

        Self {
            run_id: new_run_id(),
            workbook: workbook.into(),
            status,
            usage,
            elapsed_ms,
            sheets,
            failures,
            error: None,
        }
    }

    /// Summary for a workbook that could not be processed at all
    pub fn workbook_error(workbook: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            run_id: new_run_id(),
            workbook: workbook.into(),
            status: RunStatus::Error,
            usage: TokenUsage::default(),
            elapsed_ms,
            sheets: Vec::new(),
            failures: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Total records across successful sheets
    pub fn total_records(&self) -> usize {
        self.sheets.iter().map(|s| s.records).sum()
    }

    /// Generate a summary report
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Extraction Summary: {}", self.workbook),
            "==================".to_string(),
            format!("Run: {}", self.run_id),
            format!("Status: {}", self.status),
            format!("Elapsed: {:.2}s", self.elapsed_ms as f64 / 1000.0),
            format!(
                "Tokens: {} prompt, {} completion",
                self.usage.prompt_tokens, self.usage.completion_tokens
            ),
            format!("Records: {}", self.total_records()),
            String::new(),
        ];

        if let Some(error) = &self.error {
            lines.push(format!("Workbook error: {}", error));
            return lines.join("\n");
        }

        lines.push(format!("Sheets ({}):", self.sheets.len()));
        for sheet in &self.sheets {
            let note = match (&sheet.error, &sheet.stopped_early_after) {
                (Some(_), _) => "failed".to_string(),
                (None, Some(range)) => format!("stopped early after {}", range),
                (None, None) => "ok".to_string(),
            };
            lines.push(format!(
                "  {}: {} records, {}/{} chunks, {} tokens ({})",
                sheet.sheet_name,
                sheet.records,
                sheet.chunks_processed,
                sheet.chunks_planned,
                sheet.usage.total(),
                note
            ));
        }

        if !self.failures.is_empty() {
            lines.push(String::new());
            lines.push("Failures:".to_string());
            for failure in &self.failures {
                lines.push(format!("  {}: {}", failure.sheet, failure.error));
            }
        }

        lines.join("\n")
    }
}

fn new_run_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_sheet(name: &str, prompt: u64, completion: u64) -> SheetExtractionSummary {
        SheetExtractionSummary {
            sheet_name: name.to_string(),
            usage: TokenUsage::new(prompt, completion),
            records: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_usage_arithmetic() {
        let mut usage = TokenUsage::new(10, 5);
        usage += TokenUsage::new(1, 2);
        assert_eq!(usage, TokenUsage::new(11, 7));
        assert_eq!(usage.total(), 18);

        let summed: TokenUsage = vec![TokenUsage::new(1, 1), TokenUsage::new(2, 2)]
            .into_iter()
            .sum();
        assert_eq!(summed, TokenUsage::new(3, 3));
    }

    #[test]
    fn test_all_sheets_succeed() {
        let summary = WorkbookExtractionSummary::from_sheets(
            "boq.xlsx",
            vec![ok_sheet("A", 100, 10), ok_sheet("B", 50, 5)],
            1200,
        );
        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.usage, TokenUsage::new(150, 15));
        assert!(summary.failures.is_empty());
        assert_eq!(summary.total_records(), 6);
    }

    #[test]
    fn test_failed_sheet_excluded_from_totals() {
        let mut failed = SheetExtractionSummary::failed("B", "header block not found", 40);
        failed.usage = TokenUsage::new(999, 999);

        let summary = WorkbookExtractionSummary::from_sheets(
            "boq.xlsx",
            vec![ok_sheet("A", 100, 10), failed, ok_sheet("C", 1, 1)],
            500,
        );

        assert_eq!(summary.status, RunStatus::PartialSuccess);
        assert_eq!(summary.usage, TokenUsage::new(101, 11));
        assert_eq!(
            summary.failures,
            vec![SheetFailure {
                sheet: "B".to_string(),
                error: "header block not found".to_string()
            }]
        );
    }

    #[test]
    fn test_workbook_error_summary() {
        let summary = WorkbookExtractionSummary::workbook_error("missing.xlsx", "file not found", 3);
        assert_eq!(summary.status, RunStatus::Error);
        assert!(summary.summary().contains("Workbook error: file not found"));
    }

    #[test]
    fn test_summary_report_lists_failures() {
        let summary = WorkbookExtractionSummary::from_sheets(
            "boq.xlsx",
            vec![ok_sheet("A", 1, 1), SheetExtractionSummary::failed("B", "boom", 1)],
            10,
        );
        let report = summary.summary();
        assert!(report.contains("Status: partial_success"));
        assert!(report.contains("  B: boom"));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&RunStatus::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
    }
}
