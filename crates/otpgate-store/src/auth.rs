//! Credential-bundle bookkeeping.
//!
//! The bundle's contents are opaque: the protocol client reads and writes
//! them itself. This side only answers "is a usable bundle present" and
//! performs the destructive clear when credentials are invalidated.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::StoreError;

/// Marker file the protocol client writes once registration succeeds.
/// Its presence is the validity predicate for the whole bundle.
pub const CREDS_FILE: &str = "creds.json";

pub struct AuthStore {
    dir: PathBuf,
}

impl AuthStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a usable credential bundle is present.
    pub fn is_valid(&self) -> bool {
        self.dir.join(CREDS_FILE).is_file()
    }

    pub fn folder_exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Destroy the bundle. Idempotent; a missing folder is not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!(dir = %self.dir.display(), "credential bundle cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
