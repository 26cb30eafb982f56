//! Content fingerprint of the corpus.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::warn;

/// SHA-256 over the bytes of every corpus document, in sorted path order.
///
/// Only file contents contribute: renames that keep the order, copies and
/// timestamp changes leave the fingerprint unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the given files. Files that cannot be opened are skipped with a warning.
    pub fn compute(paths: &[PathBuf]) -> Self {
        let mut sorted: Vec<&PathBuf> = paths.iter().collect();
        sorted.sort();

        let mut hasher = Sha256::new();
        for path in sorted {
            if let Err(e) = hash_file(&mut hasher, path) {
                warn!("Skipping {} in fingerprint: {}", path.display(), e);
            }
        }

        Fingerprint(hex::encode(hasher.finalize()))
    }

    /// Wrap a previously recorded fingerprint.
    pub fn from_record(record: &str) -> Self {
        Fingerprint(record.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hash_file(hasher: &mut Sha256, path: &Path) -> std::io::Result<()> {
    let mut file = File::open(path)?;
    std::io::copy(&mut file, hasher)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic_and_order_independent() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "alpha").unwrap();
        std::fs::write(&b, "beta").unwrap();

        let first = Fingerprint::compute(&[a.clone(), b.clone()]);
        let second = Fingerprint::compute(&[b, a]);
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn test_any_byte_change_changes_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("guide.txt");
        std::fs::write(&doc, "Normal fasting blood sugar is 70 to 99 mg/dL.").unwrap();
        let before = Fingerprint::compute(&[doc.clone()]);

        std::fs::write(&doc, "Normal fasting blood sugar is 70 to 98 mg/dL.").unwrap();
        let after = Fingerprint::compute(&[doc]);

        assert_ne!(before, after);
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("guide.txt");
        std::fs::write(&doc, "content").unwrap();

        let with_missing = Fingerprint::compute(&[doc.clone(), dir.path().join("gone.txt")]);
        assert_eq!(with_missing, Fingerprint::compute(&[doc]));
    }

    #[test]
    fn test_record_round_trip_trims_whitespace() {
        let fp = Fingerprint::from_record("  abcdef0123456789\n");
        assert_eq!(fp.as_str(), "abcdef0123456789");
        assert_eq!(fp.short(), "abcdef012345");
    }
}
