//! JSON document store.
//!
//! The snapshot lives in a single pretty-printed JSON file. Every save
//! rewrites the whole document through a temporary sibling file that is
//! flushed and then renamed over the original, so readers see either the old
//! document or the new one and never a torn write.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::snapshot::Snapshot;
use crate::storage::traits::{SnapshotStore, StorageError};

use super::file_lock::FileLock;
use super::PersistentConfig;

/// Snapshot store backed by one JSON file, exclusively locked while open.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    config: PersistentConfig,
    io: Mutex<()>,
    _lock: FileLock,
}

impl JsonFileStore {
    /// Lock `path` and open the store. The document itself may not exist
    /// yet; `load` reports that, `save` creates it.
    pub fn open(path: &Path, config: PersistentConfig) -> Result<Self, StorageError> {
        let lock = FileLock::acquire(path).map_err(|e| match e.kind() {
            ErrorKind::WouldBlock => StorageError::Locked(path.display().to_string()),
            _ => StorageError::BackendError(format!(
                "failed to lock {}: {e}",
                path.display()
            )),
        })?;
        debug!(path = %path.display(), lock = %lock.path().display(), "opened snapshot store");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            io: Mutex::new(()),
            _lock: lock,
        })
    }

    /// Path of the JSON document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Vec<u8>, StorageError> {
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::Missing(self.path.display().to_string()),
            _ => StorageError::BackendError(format!("read {}: {e}", self.path.display())),
        })?;

        let len = file
            .metadata()
            .map_err(|e| StorageError::BackendError(format!("stat {}: {e}", self.path.display())))?
            .len();
        if len > self.config.max_document_bytes {
            return Err(StorageError::Corrupt(format!(
                "document size {len} exceeds maximum {}",
                self.config.max_document_bytes
            )));
        }

        let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        file.take(self.config.max_document_bytes)
            .read_to_end(&mut buf)
            .map_err(|e| StorageError::BackendError(format!("read {}: {e}", self.path.display())))?;
        Ok(buf)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| String::from("snapshot"), |n| n.to_string_lossy().into_owned());
        self.path
            .with_file_name(format!(".{name}.tmp.{}", Uuid::new_v4()))
    }

    fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        let temp_path = self.temp_path();
        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            if self.config.sync_on_write {
                file.sync_all()?;
            }
            fs::rename(&temp_path, &self.path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Snapshot, StorageError> {
        let _io = self
            .io
            .lock()
            .map_err(|_| StorageError::BackendError("poisoned lock: json.load".to_string()))?;

        let bytes = self.read_document()?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "snapshot document is corrupt");
            StorageError::Corrupt(e.to_string())
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(snapshot)
        } else {
            serde_json::to_vec(snapshot)
        }
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let _io = self
            .io
            .lock()
            .map_err(|_| StorageError::BackendError("poisoned lock: json.save".to_string()))?;

        self.write_atomically(&bytes).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "snapshot write failed");
            StorageError::BackendError(format!("write {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot saved");
        Ok(())
    }
}
