//! Quarry Storage Layer
//!
//! Implements the `ArtifactStore` trait for the JSON artifacts produced while
//! extracting a workbook: sheet metadata, chunk plans, chunk results,
//! boundary rewrites, merged sheet records and run summaries.
//!
//! # Backends
//!
//! - [`JsonDirStore`]: one pretty-printed JSON file per artifact in a
//!   directory tree that mirrors the workbook's sheets
//! - [`SqliteArtifactStore`]: a single SQLite table keyed by
//!   `(kind, sheet, range)`
//! - [`MemoryArtifactStore`]: in-process map, for tests
//!
//! All backends take `&self` for writes, so one store can be shared across
//! concurrently running sheets. Keys are partitioned by sheet and range, so
//! concurrent writers never contend on the same artifact.
//!
//! # Examples
//!
//! ```no_run
//! use quarry_domain::{ArtifactKey, ArtifactStore, RowRange};
//! use quarry_store::JsonDirStore;
//!
//! let store = JsonDirStore::new("outputs/boq").unwrap();
//! store.save(&ArtifactKey::chunk_plan("Sheet1"), &vec![RowRange::new(0, 30)]).unwrap();
//! ```

#![warn(missing_docs)]

pub mod fs;
pub mod memory;
pub mod sqlite;

use quarry_domain::ArtifactKey;
use thiserror::Error;

pub use fs::JsonDirStore;
pub use memory::MemoryArtifactStore;
pub use sqlite::SqliteArtifactStore;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Artifact could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is missing a component its kind requires
    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    /// Store lock was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Lock,
}

/// Check that `key` has the sheet and range its kind requires
pub(crate) fn validate_key(key: &ArtifactKey) -> Result<(), StoreError> {
    use quarry_domain::ArtifactKind::*;

    let needs_sheet = !matches!(key.kind, Combined | RunSummary);
    let needs_range = matches!(key.kind, Chunk | Boundary);

    if needs_sheet && key.sheet.is_none() {
        return Err(StoreError::InvalidKey(format!("{} requires a sheet", key)));
    }
    if needs_range && key.range.is_none() {
        return Err(StoreError::InvalidKey(format!("{} requires a row range", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_domain::{ArtifactKind, RowRange};

    #[test]
    fn test_validate_key() {
        assert!(validate_key(&ArtifactKey::chunk("S", RowRange::new(0, 30))).is_ok());
        assert!(validate_key(&ArtifactKey::combined()).is_ok());

        let missing_range = ArtifactKey {
            kind: ArtifactKind::Boundary,
            sheet: Some("S".to_string()),
            range: None,
        };
        assert!(matches!(
            validate_key(&missing_range),
            Err(StoreError::InvalidKey(_))
        ));

        let missing_sheet = ArtifactKey {
            kind: ArtifactKind::Metadata,
            sheet: None,
            range: None,
        };
        assert!(validate_key(&missing_sheet).is_err());
    }
}
