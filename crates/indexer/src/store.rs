use lens_model::ProgramModel;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::corpus::{Corpus, CorpusSnapshot, UnitEntry};
use crate::error::Result;
use crate::unit_index::UnitIndex;

pub const UNIT_STORE_SCHEMA_VERSION: u32 = 1;

/// Directory under the project root holding persisted state
pub const STORE_DIR_NAME: &str = ".cobol-lens";

pub fn store_dir_for_project_root(root: &Path) -> PathBuf {
    root.join(STORE_DIR_NAME).join("units")
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredUnit {
    schema_version: u32,
    unit_id: String,
    content_hash: String,
    model: ProgramModel,
    index: UnitIndex,
}

/// One JSON file per unit, keyed by unit id; loads skip files from other schema
/// versions or that fail to parse
pub struct UnitStore {
    dir: PathBuf,
}

impl UnitStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_project_root(root: &Path) -> Self {
        Self::new(store_dir_for_project_root(root))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, unit_id: &str) -> PathBuf {
        self.dir.join(file_name_for(unit_id))
    }

    pub async fn save(&self, entry: &UnitEntry) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let stored = StoredUnit {
            schema_version: UNIT_STORE_SCHEMA_VERSION,
            unit_id: entry.unit_id().to_string(),
            content_hash: entry.model.content_hash.clone(),
            model: ProgramModel::clone(&entry.model),
            index: UnitIndex::clone(&entry.index),
        };
        let bytes = serde_json::to_vec(&stored)?;

        let path = self.path_for(entry.unit_id());
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn remove(&self, unit_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(unit_id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Persist every unit of `snapshot` whose stored hash differs, and delete files of
    /// units no longer present. Returns the number of files written.
    pub async fn sync(&self, snapshot: &CorpusSnapshot) -> Result<usize> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let stored = self.stored_hashes().await?;

        let mut written = 0;
        let mut keep = BTreeSet::new();
        for entry in snapshot.units() {
            let file = file_name_for(entry.unit_id());
            let current = stored.iter().any(|(name, hash)| name == &file && hash == &entry.model.content_hash);
            if !current {
                self.save(entry).await?;
                written += 1;
            }
            keep.insert(file);
        }

        for (file, _) in stored {
            if !keep.contains(&file) {
                tokio::fs::remove_file(self.dir.join(&file)).await?;
            }
        }
        log::debug!("Store sync: {written} units written to {}", self.dir.display());
        Ok(written)
    }

    /// Every readable unit of the current schema, in unit id order
    pub async fn load_all(&self) -> Result<Vec<UnitEntry>> {
        let mut entries = Vec::new();
        for path in self.json_files().await? {
            match read_stored(&path).await {
                Ok(stored)
                    if stored.unit_id != *stored.model.unit_id
                        || stored.content_hash != stored.model.content_hash =>
                {
                    log::warn!("Skipping {}: header does not match its model", path.display());
                }
                Ok(stored) if stored.schema_version == UNIT_STORE_SCHEMA_VERSION => {
                    entries.push(UnitEntry {
                        model: Arc::new(stored.model),
                        index: Arc::new(stored.index),
                    });
                }
                Ok(stored) => log::warn!(
                    "Skipping {}: schema version {} (expected {})",
                    path.display(),
                    stored.schema_version,
                    UNIT_STORE_SCHEMA_VERSION
                ),
                Err(err) => log::warn!("Skipping unreadable unit {}: {err}", path.display()),
            }
        }
        entries.sort_by(|a, b| a.unit_id().cmp(b.unit_id()));
        Ok(entries)
    }

    /// Load everything into `corpus`; returns the number of units restored
    pub async fn restore_into(&self, corpus: &Corpus) -> Result<usize> {
        let entries = self.load_all().await?;
        let count = entries.len();
        for entry in entries {
            corpus.commit_entry(entry);
        }
        log::info!("Restored {count} units from {}", self.dir.display());
        Ok(count)
    }

    async fn json_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// (file name, content hash) of every stored unit; unreadable files hash to ""
    async fn stored_hashes(&self) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        for path in self.json_files().await? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let hash = read_header(&path).await.unwrap_or_default();
            out.push((name, hash));
        }
        Ok(out)
    }
}

async fn read_stored(path: &Path) -> Result<StoredUnit> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Content hash of a stored unit without materializing its model
async fn read_header(path: &Path) -> Result<String> {
    #[derive(Deserialize)]
    struct Header {
        schema_version: u32,
        content_hash: String,
    }
    let bytes = tokio::fs::read(path).await?;
    let header: Header = serde_json::from_slice(&bytes)?;
    if header.schema_version == UNIT_STORE_SCHEMA_VERSION {
        Ok(header.content_hash)
    } else {
        Ok(String::new())
    }
}

/// Readable prefix plus a short hash so ids differing only in case or separators never
/// share a file
fn file_name_for(unit_id: &str) -> String {
    let readable: String = unit_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let digest = Sha256::digest(unit_id.as_bytes());
    let short: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("{readable}-{short}.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_safe_and_distinct() {
        let a = file_name_for("BATCH/PAYROLL");
        let b = file_name_for("BATCH_PAYROLL");
        assert!(a.starts_with("BATCH_PAYROLL-"));
        assert!(a.ends_with(".json"));
        assert_ne!(a, b);
        assert!(!a.contains('/'));
    }
}
