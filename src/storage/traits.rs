//! Abstract storage contract for coachvault.
//!
//! The store holds one aggregate [`Snapshot`] and only offers whole-document
//! load and save. It makes no isolation promises: callers that read, modify
//! and write back must serialize that cycle themselves (the unlock engine
//! does).

use thiserror::Error;

use crate::snapshot::Snapshot;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing document does not exist.
    #[error("Snapshot not found: {0}")]
    Missing(String),

    /// The backing document exists but cannot be decoded.
    #[error("Snapshot corrupt: {0}")]
    Corrupt(String),

    /// Another holder owns the store.
    #[error("Store locked: {0}")]
    Locked(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Backend error (I/O, poisoned lock, injected failure).
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Whole-snapshot persistence.
///
/// # Safety Considerations
/// - `save` must either replace the full document or leave the previous one
///   intact; partial writes are not allowed
/// - Implementations must be safe to share between threads
pub trait SnapshotStore: Send + Sync {
    /// Read the full current snapshot.
    fn load(&self) -> Result<Snapshot, StorageError>;

    /// Replace the full snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_snapshot_store_object_safe(_: &dyn SnapshotStore) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Missing("./db.json".to_string());
        assert!(err.to_string().contains("Snapshot not found"));

        let err = StorageError::Corrupt("expected value at line 1".to_string());
        assert!(err.to_string().contains("line 1"));

        let err = StorageError::BackendError("disk full".to_string());
        assert!(err.to_string().contains("disk full"));
    }
}
