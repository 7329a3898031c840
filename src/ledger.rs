use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Write as _},
    path::PathBuf,
};

use crate::error::{MotionvizError, MotionvizResult};

/// Persisted record of which remote items have been fully processed.
///
/// On-disk shape is a JSON array of item identifiers. Entries are
/// append-only: they are never deleted or rewritten, which is what makes a
/// rerun resume instead of redo. Single-writer; concurrent runs would race
/// and are out of scope.
#[derive(Debug)]
pub struct StatusLedger {
    path: PathBuf,
    // Insertion order is preserved for the file; the set makes `contains`
    // O(1).
    entries: Vec<String>,
    index: HashSet<String>,
}

impl StatusLedger {
    /// Load the ledger, treating a missing file as empty.
    pub fn load(path: impl Into<PathBuf>) -> MotionvizResult<Self> {
        let path = path.into();
        let entries: Vec<String> = if path.exists() {
            let f = File::open(&path).map_err(|e| {
                MotionvizError::validation(format!("open status file '{}': {e}", path.display()))
            })?;
            serde_json::from_reader(BufReader::new(f)).map_err(|e| {
                MotionvizError::validation(format!("parse status file '{}': {e}", path.display()))
            })?
        } else {
            Vec::new()
        };

        let index = entries.iter().cloned().collect();
        Ok(Self {
            path,
            entries,
            index,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark an identifier complete. Recording a known identifier is a no-op;
    /// the caller is responsible for a subsequent [`flush`](Self::flush).
    pub fn record(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.index.insert(id.clone()) {
            self.entries.push(id);
        }
    }

    /// Write the ledger out, via a sibling temp file and rename so a crash
    /// mid-write cannot truncate the previous state.
    pub fn flush(&self) -> MotionvizResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MotionvizError::validation(format!(
                    "create status directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| MotionvizError::validation(format!("serialize status file: {e}")))?;

        let mut tmp = File::create(&tmp_path).map_err(|e| {
            MotionvizError::validation(format!("create '{}': {e}", tmp_path.display()))
        })?;
        tmp.write_all(&bytes).map_err(|e| {
            MotionvizError::validation(format!("write '{}': {e}", tmp_path.display()))
        })?;
        tmp.flush().map_err(|e| {
            MotionvizError::validation(format!("flush '{}': {e}", tmp_path.display()))
        })?;
        drop(tmp);

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            MotionvizError::validation(format!(
                "rename '{}' over '{}': {e}",
                tmp_path.display(),
                self.path.display()
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = StatusLedger::load(tmp.path().join("status.json")).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.contains("anything"));
    }

    #[test]
    fn record_flush_reload_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("status.json");

        let mut ledger = StatusLedger::load(&path).unwrap();
        ledger.record("a/b/c");
        ledger.record("d/e/f");
        ledger.flush().unwrap();

        let reloaded = StatusLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("a/b/c"));
        assert!(reloaded.contains("d/e/f"));
        assert!(!reloaded.contains("g"));
    }

    #[test]
    fn recording_a_known_id_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = StatusLedger::load(tmp.path().join("status.json")).unwrap();
        ledger.record("x");
        ledger.record("x");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn flush_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("status.json");
        let mut ledger = StatusLedger::load(&path).unwrap();
        ledger.record("x");
        ledger.flush().unwrap();
        ledger.flush().unwrap();
        assert_eq!(StatusLedger::load(&path).unwrap().len(), 1);
    }

    #[test]
    fn file_preserves_insertion_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("status.json");
        let mut ledger = StatusLedger::load(&path).unwrap();
        ledger.record("second-listed");
        ledger.record("first-listed");
        ledger.flush().unwrap();

        let raw: Vec<String> =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(raw, vec!["second-listed", "first-listed"]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("status.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(StatusLedger::load(&path).is_err());
    }
}
