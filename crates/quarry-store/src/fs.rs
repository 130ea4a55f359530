//! Directory-of-JSON-files artifact store
//!
//! Layout under the root (one root per workbook):
//!
//! ```text
//! <sheet>/metadata.json
//! <sheet>/chunking/chunk_ranges.json
//! <sheet>/chunking/chunk_outputs/page_output_<start>_<end>.json
//! <sheet>/boundaries/page_output_<start>_<end>.json
//! <sheet>/final_output/final_product_entries.json
//! product_entries_combined_across_sheets.json
//! run_summary.json
//! ```
//!
//! Sheet names are passed through [`safe_name`].

use crate::{validate_key, StoreError};
use quarry_domain::traits::ArtifactStore;
use quarry_domain::{safe_name, ArtifactKey, ArtifactKind, RowRange};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Artifact store writing pretty-printed JSON files
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path an artifact is stored at
    pub fn path_for(&self, key: &ArtifactKey) -> Result<PathBuf, StoreError> {
        validate_key(key)?;

        let sheet_dir = || {
            let sheet = key.sheet.as_deref().unwrap_or_default();
            self.root.join(safe_name(sheet))
        };
        let page = |range: Option<RowRange>| {
            let range = range.unwrap_or_default();
            format!("page_output_{}_{}.json", range.start, range.end)
        };

        Ok(match key.kind {
            ArtifactKind::Metadata => sheet_dir().join("metadata.json"),
            ArtifactKind::ChunkPlan => sheet_dir().join("chunking").join("chunk_ranges.json"),
            ArtifactKind::Chunk => sheet_dir()
                .join("chunking")
                .join("chunk_outputs")
                .join(page(key.range)),
            ArtifactKind::Boundary => sheet_dir().join("boundaries").join(page(key.range)),
            ArtifactKind::SheetRecord => sheet_dir()
                .join("final_output")
                .join("final_product_entries.json"),
            ArtifactKind::Combined => self
                .root
                .join("product_entries_combined_across_sheets.json"),
            ArtifactKind::RunSummary => self.root.join("run_summary.json"),
        })
    }
}

impl ArtifactStore for JsonDirStore {
    type Error = StoreError;

    fn save<T: Serialize>(&self, key: &ArtifactKey, record: &T) -> Result<(), Self::Error> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_string_pretty(record)?;

        // Write then rename so readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;

        debug!("Saved {} to {}", key, path.display());
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<Option<T>, Self::Error> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let body = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    fn exists(&self, key: &ArtifactKey) -> Result<bool, Self::Error> {
        Ok(self.path_for(key)?.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path()).unwrap();
        let range = RowRange::new(30, 60);

        assert_eq!(
            store.path_for(&ArtifactKey::chunk("Bill 1", range)).unwrap(),
            dir.path()
                .join("Bill_1")
                .join("chunking")
                .join("chunk_outputs")
                .join("page_output_30_60.json")
        );
        assert_eq!(
            store.path_for(&ArtifactKey::boundary("Bill 1", range)).unwrap(),
            dir.path().join("Bill_1").join("boundaries").join("page_output_30_60.json")
        );
        assert_eq!(
            store.path_for(&ArtifactKey::run_summary()).unwrap(),
            dir.path().join("run_summary.json")
        );
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path()).unwrap();
        let key = ArtifactKey::metadata("S");

        store.save(&key, &vec![1, 2, 3]).unwrap();
        store.save(&key, &vec![4]).unwrap();

        let loaded: Option<Vec<i32>> = store.load(&key).unwrap();
        assert_eq!(loaded, Some(vec![4]));

        let entries: Vec<_> = fs::read_dir(dir.path().join("S")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
