//! On-disk persistence of the vector index and its fingerprint record.
//!
//! Two files live in the index directory: `index.json` (the serialized index
//! with its metadata) and `fingerprint.txt`. The fingerprint record is removed
//! before a save and written only after the index file is in place, so a crash
//! mid-save leaves no record and forces a rebuild on the next start.

use super::Fingerprint;
use crate::error::{KanhuError, Result};
use crate::vector_store::VectorIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const INDEX_FILE: &str = "index.json";
const FINGERPRINT_FILE: &str = "fingerprint.txt";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PersistedIndex<I> {
    format_version: u32,
    fingerprint: String,
    built_at: DateTime<Utc>,
    index: I,
}

/// Reads and writes the persisted index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.dir.join(FINGERPRINT_FILE)
    }

    /// The fingerprint the current index was built from, if any.
    pub fn recorded_fingerprint(&self) -> Option<Fingerprint> {
        fs::read_to_string(self.fingerprint_path())
            .ok()
            .map(|s| Fingerprint::from_record(&s))
            .filter(|f| !f.as_str().is_empty())
    }

    /// Load the index if it was built from `expected` with the embedder `model_id`.
    ///
    /// Any mismatch or unreadable file is an `IndexIo` error; callers rebuild.
    pub fn load(&self, expected: &Fingerprint, model_id: &str) -> Result<VectorIndex> {
        let recorded = self
            .recorded_fingerprint()
            .ok_or_else(|| KanhuError::IndexIo("no fingerprint record".to_string()))?;
        if &recorded != expected {
            return Err(KanhuError::IndexIo(format!(
                "corpus changed ({} -> {})",
                recorded.short(),
                expected.short()
            )));
        }

        let file = fs::File::open(self.index_path())
            .map_err(|e| KanhuError::IndexIo(format!("cannot open index: {}", e)))?;
        let record: PersistedIndex<VectorIndex> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| KanhuError::IndexIo(format!("corrupt index: {}", e)))?;

        if record.format_version != FORMAT_VERSION {
            return Err(KanhuError::IndexIo(format!(
                "unsupported index format {}",
                record.format_version
            )));
        }
        if record.fingerprint != expected.as_str() {
            return Err(KanhuError::IndexIo(
                "index file does not match fingerprint record".to_string(),
            ));
        }
        if record.index.embedder() != model_id {
            return Err(KanhuError::IndexIo(format!(
                "index built with {}, current embedder is {}",
                record.index.embedder(),
                model_id
            )));
        }
        if record.index.is_empty() {
            return Err(KanhuError::IndexIo("index is empty".to_string()));
        }

        debug!(
            "Loaded index with {} entries built at {}",
            record.index.len(),
            record.built_at
        );
        Ok(record.index)
    }

    /// Persist the index, then record its fingerprint.
    pub fn save(&self, fingerprint: &Fingerprint, index: &VectorIndex) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| KanhuError::IndexIo(format!("cannot create {}: {}", self.dir.display(), e)))?;

        match fs::remove_file(self.fingerprint_path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(KanhuError::IndexIo(format!("cannot clear fingerprint: {}", e))),
        }

        let record = PersistedIndex {
            format_version: FORMAT_VERSION,
            fingerprint: fingerprint.as_str().to_string(),
            built_at: Utc::now(),
            index,
        };

        self.write_atomic(&self.index_path(), |writer| {
            serde_json::to_writer(&mut *writer, &record)?;
            Ok(())
        })?;
        self.write_atomic(&self.fingerprint_path(), |writer| {
            writer.write_all(fingerprint.as_str().as_bytes())?;
            Ok(())
        })?;

        Ok(())
    }

    fn write_atomic<F>(&self, dest: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<&mut fs::File>) -> Result<()>,
    {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            write(&mut writer)?;
            writer.flush()?;
        }
        tmp.persist(dest)
            .map_err(|e| KanhuError::IndexIo(format!("cannot write {}: {}", dest.display(), e.error)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::DocumentChunk;

    fn sample_index(embedder: &str) -> VectorIndex {
        let chunk = DocumentChunk {
            id: "guide.txt#p1#0".to_string(),
            document_id: "guide.txt".to_string(),
            page: 1,
            order: 0,
            text: "Check blood pressure daily.".to_string(),
        };
        VectorIndex::build(embedder, vec![chunk], vec![vec![0.6, 0.8]]).unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index"));
        let fp = Fingerprint::from_record("abc123");

        store.save(&fp, &sample_index("hash:2")).unwrap();
        assert_eq!(store.recorded_fingerprint(), Some(fp.clone()));

        let index = store.load(&fp, "hash:2").unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_load_rejects_mismatches() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let fp = Fingerprint::from_record("abc123");
        store.save(&fp, &sample_index("hash:2")).unwrap();

        let other = Fingerprint::from_record("def456");
        assert!(matches!(store.load(&other, "hash:2"), Err(KanhuError::IndexIo(_))));
        assert!(matches!(store.load(&fp, "ollama:x"), Err(KanhuError::IndexIo(_))));
    }

    #[test]
    fn test_corrupt_index_is_index_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let fp = Fingerprint::from_record("abc123");
        store.save(&fp, &sample_index("hash:2")).unwrap();

        fs::write(store.index_path(), b"{ not json").unwrap();
        assert!(matches!(store.load(&fp, "hash:2"), Err(KanhuError::IndexIo(_))));
    }

    #[test]
    fn test_missing_record_is_index_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let fp = Fingerprint::from_record("abc123");
        assert!(store.recorded_fingerprint().is_none());
        assert!(matches!(store.load(&fp, "hash:2"), Err(KanhuError::IndexIo(_))));
    }
}
