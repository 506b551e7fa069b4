//! Durable storage for the connection record.
//!
//! One human-readable JSON document, overwritten wholesale on every state
//! transition. Loading never fails: missing or corrupt data yields defaults,
//! because refusing to start over a torn write would turn a crash into an
//! outage.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use otpgate_core::ConnectionRecord;

use crate::StoreError;

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record, falling back to defaults on any problem.
    pub fn load(&self) -> ConnectionRecord {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ConnectionRecord::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file unreadable, using defaults");
                return ConnectionRecord::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file corrupt, using defaults");
                ConnectionRecord::default()
            }
        }
    }

    /// Persist the record. Writes to a sibling temp file and renames it into
    /// place so a crash mid-write leaves either the old or the new record.
    pub fn save(&self, record: &ConnectionRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("connection_state.json"))
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load(), ConnectionRecord::default());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut record = ConnectionRecord::default();
        record.mark_connected("33612345678@s.whatsapp.net", Some("device-7"));
        store.save(&record).unwrap();

        assert_eq!(store.load(), record);
    }

    #[test]
    fn load_corrupt_json_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{not json at all").unwrap();
        assert_eq!(store.load(), ConnectionRecord::default());
    }

    #[test]
    fn load_truncated_write_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut record = ConnectionRecord::default();
        record.mark_connected("a@s.whatsapp.net", None);
        store.save(&record).unwrap();

        // Simulate a crash mid-write of a non-atomic writer.
        let full = fs::read_to_string(store.path()).unwrap();
        fs::write(store.path(), &full[..full.len() / 2]).unwrap();

        assert_eq!(store.load(), ConnectionRecord::default());
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut record = ConnectionRecord::default();
        record.mark_connected("a@s.whatsapp.net", None);
        store.save(&record).unwrap();

        record.mark_disconnected();
        store.save(&record).unwrap();

        let loaded = store.load();
        assert!(!loaded.is_connected);
        assert!(loaded.session_id.is_none());
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&ConnectionRecord::default()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["connection_state.json".to_string()]);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/dir/state.json"));
        store.save(&ConnectionRecord::default()).unwrap();
        assert!(store.path().is_file());
    }
}
