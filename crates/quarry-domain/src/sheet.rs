//! Sheet-level inputs and outputs

use crate::product::ProductRecord;
use crate::range::RowRange;
use crate::summary::TokenUsage;
use serde::{Deserialize, Serialize};

/// Result of locating the header block of a sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetMetadata {
    /// Sheet identifier
    pub sheet_name: String,
    /// Header rows rendered as ` | `-joined lines
    pub header_text: String,
    /// Context rows above the header (titles, project names)
    pub context_text: String,
    /// Index of the first data row in the cleaned sheet
    pub data_start_row: usize,
    /// Number of columns kept for each data row
    pub max_column: usize,
    /// Number of data rows after the header
    pub total_rows: usize,
    /// Tokens spent locating the header
    pub usage: TokenUsage,
}

/// Data rows of one sheet, ready to be chunked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetTable {
    /// Sheet identifier
    pub sheet_name: String,
    /// Context text passed through to every chunk result
    pub context_text: String,
    /// Header text used to render each chunk
    pub header_text: String,
    /// Data rows, already trimmed to the header width
    pub rows: Vec<Vec<String>>,
}

impl SheetTable {
    /// Build a table from metadata and the cleaned sheet rows
    pub fn from_metadata(metadata: &SheetMetadata, cleaned: &[Vec<String>]) -> Self {
        let rows = cleaned
            .iter()
            .skip(metadata.data_start_row)
            .map(|row| {
                let width = metadata.max_column.min(row.len());
                row[..width].to_vec()
            })
            .collect();

        Self {
            sheet_name: metadata.sheet_name.clone(),
            context_text: metadata.context_text.clone(),
            header_text: metadata.header_text.clone(),
            rows,
        }
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the sheet has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Final merged output of one sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    /// Sheet identifier
    pub sheet_name: String,
    /// Sheet-level context text
    pub context: String,
    /// Header text
    pub header: String,
    /// Records from every chunk, in range order
    pub records: Vec<ProductRecord>,
    /// Ranges the records were merged from
    #[serde(default)]
    pub ranges: Vec<RowRange>,
}

/// A record tagged with the sheet it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetTaggedRecord {
    /// Originating sheet
    pub sheet_name: String,
    /// The record
    #[serde(flatten)]
    pub record: ProductRecord,
}
