//! Sheet-level merge of chunk artifacts

use crate::error::ExtractorError;
use quarry_domain::traits::ArtifactStore;
use quarry_domain::{ArtifactKey, ChunkResult, RowRange, SheetRecord};
use std::fmt::Display;
use tracing::{info, warn};

/// Which chunk artifacts a merge reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeSource {
    /// Plain chunk results
    #[default]
    Chunks,
    /// Boundary-reconciled results, falling back to plain chunk results
    Reconciled,
}

/// Load the current version of one chunk
///
/// With `prefer_boundary` the boundary artifact wins when present. A missing
/// or unreadable artifact is logged and yields `None`.
pub fn load_chunk<S>(store: &S, sheet: &str, range: RowRange, prefer_boundary: bool) -> Option<ChunkResult>
where
    S: ArtifactStore,
    S::Error: Display,
{
    let mut keys = Vec::with_capacity(2);
    if prefer_boundary {
        keys.push(ArtifactKey::boundary(sheet, range));
    }
    keys.push(ArtifactKey::chunk(sheet, range));

    for key in &keys {
        match store.load::<ChunkResult>(key) {
            Ok(Some(chunk)) => return Some(chunk),
            Ok(None) => {}
            Err(e) => warn!("Could not read {}: {}", key, e),
        }
    }

    warn!("No readable artifact for rows {} of sheet '{}'", range, sheet);
    None
}

/// Concatenate the records of every range, in range order, into a sheet record
///
/// Missing or corrupt chunk artifacts contribute no records. The merged
/// record is persisted under the sheet's [`ArtifactKey::sheet_record`] key.
pub fn merge_sheet<S>(
    store: &S,
    sheet_name: &str,
    context: &str,
    header: &str,
    ranges: &[RowRange],
    source: MergeSource,
) -> Result<SheetRecord, ExtractorError>
where
    S: ArtifactStore,
    S::Error: Display,
{
    let prefer_boundary = source == MergeSource::Reconciled;
    let mut records = Vec::new();
    let mut missing = 0;

    for range in ranges {
        match load_chunk(store, sheet_name, *range, prefer_boundary) {
            Some(chunk) => records.extend(chunk.records),
            None => missing += 1,
        }
    }

    let sheet = SheetRecord {
        sheet_name: sheet_name.to_string(),
        context: context.to_string(),
        header: header.to_string(),
        records,
        ranges: ranges.to_vec(),
    };

    store
        .save(&ArtifactKey::sheet_record(sheet_name), &sheet)
        .map_err(ExtractorError::store)?;

    info!(
        "Sheet '{}': merged {} records from {} chunk(s) ({} missing)",
        sheet_name,
        sheet.records.len(),
        ranges.len() - missing,
        missing
    );

    Ok(sheet)
}
