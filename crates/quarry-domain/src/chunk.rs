//! Persisted per-chunk output

use crate::product::ProductRecord;
use crate::range::RowRange;
use crate::summary::TokenUsage;
use serde::{Deserialize, Serialize};

/// Raw-row provenance of a chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRows {
    /// Row range the chunk covered
    pub range: RowRange,
    /// Original cell values of those rows
    pub rows: Vec<Vec<String>>,
}

/// Output of one chunk: every closed block flattened into records
///
/// Written once by the chunk extractor and rewritten only by the boundary
/// reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Sheet the chunk belongs to
    pub sheet_name: String,

    /// Sheet-level context text (title rows above the header)
    pub context: String,

    /// Records of the closed blocks, in sheet order
    pub records: Vec<ProductRecord>,

    /// Raw rows the records were extracted from
    pub raw_rows: RawRows,

    /// Tokens spent extracting the chunk
    pub usage: TokenUsage,

    /// Set when the oracle reply could not be parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_failure: Option<String>,
}

impl ChunkResult {
    /// Range covered by the chunk
    pub fn range(&self) -> RowRange {
        self.raw_rows.range
    }

    /// Last record of the chunk, if any
    pub fn last_record(&self) -> Option<&ProductRecord> {
        self.records.last()
    }

    /// Records flagged as missing their block-level description
    pub fn boundary_only_records(&self) -> Vec<ProductRecord> {
        self.records
            .iter()
            .filter(|r| r.is_boundary_only())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::ProductVariant;

    fn record(desc: &str, boundary_only: bool) -> ProductRecord {
        ProductRecord {
            section_context: String::new(),
            variant: ProductVariant {
                full_product_description: desc.to_string(),
                boundary_only,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_boundary_only_subset() {
        let chunk = ChunkResult {
            records: vec![record("a", true), record("b", false), record("c", true)],
            ..Default::default()
        };
        let subset = chunk.boundary_only_records();
        assert_eq!(subset.len(), 2);
        assert_eq!(subset[1].variant.full_product_description, "c");
        assert_eq!(chunk.last_record().unwrap().variant.full_product_description, "c");
    }

    #[test]
    fn test_parse_failure_omitted_when_absent() {
        let value = serde_json::to_value(ChunkResult::default()).unwrap();
        assert!(value.get("parse_failure").is_none());
    }
}
