//! Keys for persisted artifacts
//!
//! Artifacts are partitioned by sheet and row range, so concurrent writers
//! never share a key.

use crate::range::RowRange;
use std::fmt;

/// Kind of persisted artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Header location and sheet context, keyed by `(sheet,)`
    Metadata,
    /// Planned row ranges, keyed by `(sheet,)`
    ChunkPlan,
    /// Closed records of one chunk, keyed by `(sheet, start, end)`
    Chunk,
    /// Boundary-reconciled version of a chunk, keyed by `(sheet, start, end)`
    Boundary,
    /// Merged sheet output, keyed by `(sheet,)`
    SheetRecord,
    /// Records of every sheet combined, keyed by `()`
    Combined,
    /// Workbook run summary, keyed by `()`
    RunSummary,
}

impl ArtifactKind {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Metadata => "metadata",
            ArtifactKind::ChunkPlan => "chunk_plan",
            ArtifactKind::Chunk => "chunk",
            ArtifactKind::Boundary => "boundary",
            ArtifactKind::SheetRecord => "sheet_record",
            ArtifactKind::Combined => "combined",
            ArtifactKind::RunSummary => "run_summary",
        }
    }
}

/// Address of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    /// Artifact kind
    pub kind: ArtifactKind,
    /// Owning sheet; `None` for workbook-level artifacts
    pub sheet: Option<String>,
    /// Row range for per-chunk artifacts
    pub range: Option<RowRange>,
}

impl ArtifactKey {
    fn sheet_level(kind: ArtifactKind, sheet: &str) -> Self {
        Self {
            kind,
            sheet: Some(sheet.to_string()),
            range: None,
        }
    }

    fn chunk_level(kind: ArtifactKind, sheet: &str, range: RowRange) -> Self {
        Self {
            kind,
            sheet: Some(sheet.to_string()),
            range: Some(range),
        }
    }

    /// Metadata of a sheet
    pub fn metadata(sheet: &str) -> Self {
        Self::sheet_level(ArtifactKind::Metadata, sheet)
    }

    /// Chunk plan of a sheet
    pub fn chunk_plan(sheet: &str) -> Self {
        Self::sheet_level(ArtifactKind::ChunkPlan, sheet)
    }

    /// Chunk result of one range
    pub fn chunk(sheet: &str, range: RowRange) -> Self {
        Self::chunk_level(ArtifactKind::Chunk, sheet, range)
    }

    /// Boundary artifact of one range
    pub fn boundary(sheet: &str, range: RowRange) -> Self {
        Self::chunk_level(ArtifactKind::Boundary, sheet, range)
    }

    /// Merged output of a sheet
    pub fn sheet_record(sheet: &str) -> Self {
        Self::sheet_level(ArtifactKind::SheetRecord, sheet)
    }

    /// Records of every sheet combined
    pub fn combined() -> Self {
        Self {
            kind: ArtifactKind::Combined,
            sheet: None,
            range: None,
        }
    }

    /// Workbook run summary
    pub fn run_summary() -> Self {
        Self {
            kind: ArtifactKind::RunSummary,
            sheet: None,
            range: None,
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(sheet) = &self.sheet {
            write!(f, "({}", sheet)?;
            if let Some(range) = &self.range {
                write!(f, ", {}", range)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Make a name safe for use as a path segment
///
/// ASCII alphanumerics, `_` and `-` are kept; everything else becomes `_`.
pub fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("Bill No. 2 (Civil)"), "Bill_No__2__Civil_");
        assert_eq!(safe_name("MEP-final_v2"), "MEP-final_v2");
        assert_eq!(safe_name("Préliminaires"), "Pr_liminaires");
    }

    #[test]
    fn test_key_display() {
        assert_eq!(
            ArtifactKey::chunk("Sheet1", RowRange::new(0, 30)).to_string(),
            "chunk(Sheet1, 0-30)"
        );
        assert_eq!(ArtifactKey::metadata("Sheet1").to_string(), "metadata(Sheet1)");
        assert_eq!(ArtifactKey::combined().to_string(), "combined");
    }

    #[test]
    fn test_chunk_and_boundary_keys_differ() {
        let range = RowRange::new(30, 60);
        assert_ne!(ArtifactKey::chunk("S", range), ArtifactKey::boundary("S", range));
    }
}
