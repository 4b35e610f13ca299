//! Content-hash journal.
//!
//! Tracks, per file, the SHA-256 of its content and the modification time
//! at last parse. Lives in a JSON sibling file of the store; deleting the
//! store directory (the supported reset) takes the journal with it.

use crate::error::{CodegraphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One tracked file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// SHA-256 of the file content (hex).
    pub hash: String,
    /// Modification time (seconds since epoch) at last parse.
    pub mtime: i64,
}

/// The on-disk journal: absolute path → entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journal {
    entries: BTreeMap<PathBuf, JournalEntry>,
}

impl Journal {
    /// Load the journal, returning an empty one when the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| CodegraphError::Other(format!(
                "corrupt journal {}: {e}",
                path.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Journal::default()),
            Err(e) => Err(CodegraphError::io(path, e)),
        }
    }

    /// Persist the journal.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CodegraphError::io(parent, e))?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| CodegraphError::Other(format!("serialize journal: {e}")))?;
        std::fs::write(path, data).map_err(|e| CodegraphError::io(path, e))
    }

    /// The tracked entry for a path.
    pub fn get(&self, path: &Path) -> Option<&JournalEntry> {
        self.entries.get(path)
    }

    /// Track or update a path.
    pub fn insert(&mut self, path: PathBuf, hash: String, mtime: i64) {
        self.entries.insert(path, JournalEntry { hash, mtime });
    }

    /// Stop tracking a path.
    pub fn remove(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// All tracked paths.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.keys()
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Modification time of a path in whole seconds, 0 when unavailable.
pub fn mtime_seconds(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let journal_path = dir.path().join("hashes.json");

        let mut journal = Journal::default();
        journal.insert(PathBuf::from("/p/a.py"), "abc".to_string(), 100);
        journal.save(&journal_path).unwrap();

        let loaded = Journal::load(&journal_path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(Path::new("/p/a.py")).unwrap().hash, "abc");
    }

    #[test]
    fn missing_file_is_empty_journal() {
        let journal = Journal::load(Path::new("/nonexistent/hashes.json")).unwrap();
        assert!(journal.is_empty());
    }

    #[test]
    fn remove_untracks() {
        let mut journal = Journal::default();
        journal.insert(PathBuf::from("/p/a.py"), "abc".to_string(), 100);
        journal.remove(Path::new("/p/a.py"));
        assert!(journal.is_empty());
    }
}
