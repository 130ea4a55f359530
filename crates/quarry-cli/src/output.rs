//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use quarry_domain::{RowRange, RunStatus, SheetRecord, WorkbookExtractionSummary};
use quarry_extractor::ReconcileReport;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Whether human-oriented extras (hints, paths) should be printed.
    pub fn is_table(&self) -> bool {
        self.format == OutputFormat::Table
    }

    /// Format the summary of a workbook run.
    pub fn format_workbook(&self, summary: &WorkbookExtractionSummary) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
            OutputFormat::Table => Ok(self.format_workbook_table(summary)),
            OutputFormat::Quiet => Ok(summary.run_id.clone()),
        }
    }

    fn format_workbook_table(&self, summary: &WorkbookExtractionSummary) -> String {
        let status = match summary.status {
            RunStatus::Success => self.colorize("success", "green"),
            RunStatus::PartialSuccess => self.colorize("partial_success", "yellow"),
            RunStatus::Error => self.colorize("error", "red"),
        };

        let mut lines = vec![
            format!("Workbook: {}", summary.workbook),
            format!("Run: {}", summary.run_id),
            format!("Status: {}", status),
            format!(
                "Tokens: {} prompt, {} completion",
                summary.usage.prompt_tokens, summary.usage.completion_tokens
            ),
            format!("Elapsed: {:.2}s", summary.elapsed_ms as f64 / 1000.0),
        ];

        if let Some(error) = &summary.error {
            lines.push(self.error(error));
            return lines.join("\n");
        }

        if summary.sheets.is_empty() {
            lines.push(self.warning("No sheets processed."));
            return lines.join("\n");
        }

        let mut builder = Builder::default();
        builder.push_record(["Sheet", "Status", "Chunks", "Records", "Tokens", "Elapsed"]);

        for sheet in &summary.sheets {
            let status = match (&sheet.error, &sheet.stopped_early_after) {
                (Some(_), _) => self.colorize("failed", "red"),
                (None, Some(range)) => self.colorize(&format!("stopped after {}", range), "yellow"),
                (None, None) => self.colorize("ok", "green"),
            };
            builder.push_record([
                sheet.sheet_name.clone(),
                status,
                format!("{}/{}", sheet.chunks_processed, sheet.chunks_planned),
                sheet.records.to_string(),
                sheet.usage.total().to_string(),
                format!("{:.2}s", sheet.elapsed_ms as f64 / 1000.0),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        lines.push(table.to_string());

        for failure in &summary.failures {
            lines.push(self.error(&format!("{}: {}", failure.sheet, failure.error)));
        }

        lines.join("\n")
    }

    /// Format a chunk plan.
    pub fn format_plan(&self, ranges: &[RowRange]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(ranges)?),
            OutputFormat::Quiet => Ok(ranges
                .iter()
                .map(|r| format!("{} {}", r.start, r.end))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if ranges.is_empty() {
                    return Ok(self.colorize("No rows to extract.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Chunk", "Start", "End", "Rows"]);
                for (i, range) in ranges.iter().enumerate() {
                    builder.push_record([
                        i.to_string(),
                        range.start.to_string(),
                        range.end.to_string(),
                        range.len().to_string(),
                    ]);
                }

                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                Ok(table.to_string())
            }
        }
    }

    /// Format the outcome of a reconciliation pass.
    pub fn format_reconcile(&self, report: &ReconcileReport, record: &SheetRecord) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let failures: Vec<serde_json::Value> = report
                    .failures
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "left": f.left,
                            "right": f.right,
                            "error": f.error,
                        })
                    })
                    .collect();

                Ok(serde_json::to_string_pretty(&serde_json::json!({
                    "sheet": record.sheet_name,
                    "pairs": report.pairs,
                    "merged": report.merged,
                    "skipped": report.skipped,
                    "failures": failures,
                    "usage": report.usage,
                    "records": record.records.len(),
                }))?)
            }
            OutputFormat::Quiet => Ok(record.records.len().to_string()),
            OutputFormat::Table => {
                let mut lines = vec![
                    self.success(&format!(
                        "Sheet '{}': {} pair(s), {} merged, {} skipped, {} failed",
                        record.sheet_name,
                        report.pairs,
                        report.merged,
                        report.skipped,
                        report.failures.len()
                    )),
                    format!(
                        "Tokens: {} prompt, {} completion",
                        report.usage.prompt_tokens, report.usage.completion_tokens
                    ),
                    format!("Records: {}", record.records.len()),
                ];
                for failure in &report.failures {
                    lines.push(self.warning(&format!(
                        "rows {} / {}: {}",
                        failure.left, failure.right, failure.error
                    )));
                }
                Ok(lines.join("\n"))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_domain::{SheetExtractionSummary, TokenUsage};

    fn summary() -> WorkbookExtractionSummary {
        let ok = SheetExtractionSummary {
            sheet_name: "Bill 1".to_string(),
            usage: TokenUsage::new(100, 40),
            elapsed_ms: 1200,
            chunks_planned: 3,
            chunks_processed: 3,
            records: 12,
            stopped_early_after: None,
            error: None,
        };
        let failed = SheetExtractionSummary::failed("Bill 2", "Header not found in sheet 'Bill 2'", 5);
        WorkbookExtractionSummary::from_sheets("riverside", vec![ok, failed], 1300)
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_workbook(&summary()).unwrap();
        assert!(output.contains("Status: partial_success"));
        assert!(output.contains("Bill 1"));
        assert!(output.contains("3/3"));
        assert!(output.contains("✗ Bill 2: Header not found"));
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_workbook(&summary()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["status"], "partial_success");
        assert_eq!(value["sheets"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_quiet_format() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let summary = summary();
        assert_eq!(formatter.format_workbook(&summary).unwrap(), summary.run_id);
    }

    #[test]
    fn test_workbook_error() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let summary = WorkbookExtractionSummary::workbook_error("broken", "Cannot open 'broken.xlsx'", 3);
        let output = formatter.format_workbook(&summary).unwrap();
        assert!(output.contains("✗ Cannot open"));
        assert!(!output.contains("Sheet"));
    }

    #[test]
    fn test_plan_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter
            .format_plan(&[RowRange::new(0, 30), RowRange::new(30, 45)])
            .unwrap();
        assert!(output.contains("Start"));
        assert!(output.contains("45"));

        let empty = formatter.format_plan(&[]).unwrap();
        assert!(empty.contains("No rows"));
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
    }
}
