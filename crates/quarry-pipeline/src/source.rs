//! Table sources

use crate::error::PipelineError;
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use quarry_domain::traits::TableSource;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Spreadsheet file read with calamine (xlsx, xlsm, xlsb, xls, ods)
///
/// The file is reopened for every read, so one value can serve concurrent
/// sheet runs.
#[derive(Debug, Clone)]
pub struct CalamineWorkbook {
    path: PathBuf,
}

impl CalamineWorkbook {
    /// Open a workbook, failing early if the file is not a readable spreadsheet
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let workbook = Self {
            path: path.as_ref().to_path_buf(),
        };
        workbook.sheets()?;
        Ok(workbook)
    }

    /// Path of the workbook
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem used to label runs and artifact directories
    pub fn label(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workbook".to_string())
    }

    fn sheets(&self) -> Result<Sheets<BufReader<File>>, PipelineError> {
        open_workbook_auto(&self.path).map_err(|e| {
            PipelineError::Source(format!("Cannot open '{}': {}", self.path.display(), e))
        })
    }
}

impl TableSource for CalamineWorkbook {
    type Error = PipelineError;

    fn sheet_names(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self.sheets()?.sheet_names())
    }

    fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, Self::Error> {
        let range = self
            .sheets()?
            .worksheet_range(sheet)
            .map_err(|e| PipelineError::Source(format!("Cannot read sheet '{}': {}", sheet, e)))?;

        Ok(range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// In-memory workbook
///
/// # Examples
///
/// ```
/// use quarry_pipeline::StaticWorkbook;
/// use quarry_domain::traits::TableSource;
///
/// let workbook = StaticWorkbook::new()
///     .with_sheet("Bill 1", vec![vec!["Item".to_string(), "Description".to_string()]]);
/// assert_eq!(workbook.sheet_names().unwrap(), vec!["Bill 1".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticWorkbook {
    sheets: Vec<(String, Vec<Vec<String>>)>,
}

impl StaticWorkbook {
    /// Create an empty workbook
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet
    pub fn with_sheet(mut self, name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        self.sheets.push((name.into(), rows));
        self
    }
}

impl TableSource for StaticWorkbook {
    type Error = PipelineError;

    fn sheet_names(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self.sheets.iter().map(|(name, _)| name.clone()).collect())
    }

    fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, Self::Error> {
        self.sheets
            .iter()
            .find(|(name, _)| name == sheet)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| PipelineError::Source(format!("Sheet '{}' not found", sheet)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_workbook_unknown_sheet() {
        let workbook = StaticWorkbook::new().with_sheet("A", Vec::new());
        assert!(workbook.read_rows("A").unwrap().is_empty());
        assert!(matches!(
            workbook.read_rows("B"),
            Err(PipelineError::Source(_))
        ));
    }

    #[test]
    fn test_missing_file_is_a_source_error() {
        let result = CalamineWorkbook::open("/definitely/not/here.xlsx");
        assert!(matches!(result, Err(PipelineError::Source(_))));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("Pipe".to_string())), "Pipe");
        assert_eq!(cell_text(&Data::Int(4)), "4");
    }
}
