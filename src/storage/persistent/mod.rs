//! Persistent storage backend for coachvault.
//!
//! The snapshot is one JSON document on disk:
//! - Exclusive file lock so only one process serves a document
//! - Whole-document rewrite on every save (temp file, fsync, rename)
//! - Size cap on reads so a runaway file cannot exhaust memory
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              JsonFileStore               │
//! ├──────────────────────────────────────────┤
//! │  load: read ─► size check ─► serde_json  │
//! │  save: serde_json ─► tmp ─► fsync ─► mv  │
//! │                    │                     │
//! │          ┌─────────▼─────────┐           │
//! │          │ FileLock (flock)  │           │
//! │          └───────────────────┘           │
//! └──────────────────────────────────────────┘
//! ```

mod file_lock;
mod json_file;

pub use file_lock::FileLock;
pub use json_file::JsonFileStore;

use std::path::Path;

use crate::error::{ValidationError, VaultResult};

/// Configuration for persistent storage.
#[derive(Debug, Clone, Copy)]
pub struct PersistentConfig {
    /// Whether to fsync the document before it replaces the old one.
    pub sync_on_write: bool,
    /// Largest document `load` will accept (bytes).
    pub max_document_bytes: u64,
    /// Pretty-print the JSON document.
    pub pretty: bool,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_document_bytes: 64 * 1024 * 1024, // 64 MB
            pretty: true,
        }
    }
}

impl PersistentConfig {
    const MIN_DOCUMENT_BYTES: u64 = 1024; // 1 KiB

    /// Rejects a document cap below 1 KiB.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.max_document_bytes < Self::MIN_DOCUMENT_BYTES {
            return Err(ValidationError::InvalidField {
                field: "max_document_bytes".to_string(),
                reason: format!(
                    "must be at least {} bytes (got {})",
                    Self::MIN_DOCUMENT_BYTES,
                    self.max_document_bytes
                ),
            });
        }
        Ok(self)
    }
}

/// Open the JSON snapshot document at `path`.
///
/// # Errors
/// - If the configuration is invalid
/// - If another process holds the document's lock
/// - If the containing directory does not exist
///
/// # Example
/// ```rust,ignore
/// use coachvault::storage::persistent::open_store;
///
/// let store = Arc::new(open_store("./db.json", None)?);
/// let engine = UnlockEngine::new(store);
/// ```
pub fn open_store(
    path: impl AsRef<Path>,
    config: Option<PersistentConfig>,
) -> VaultResult<JsonFileStore> {
    let cfg = config.unwrap_or_default().validate()?;
    Ok(JsonFileStore::open(path.as_ref(), cfg)?)
}
