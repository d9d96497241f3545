//! In-memory storage backend.
//!
//! Thread-safe and process-local. Intended for embedded usage, tests, and as
//! a reference implementation of [`SnapshotStore`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::snapshot::Snapshot;
use crate::storage::traits::{SnapshotStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Thread-safe in-memory snapshot store.
///
/// `load` hands out a copy, so mutations made by a caller are invisible to
/// everyone else until `save`.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    state: RwLock<Snapshot>,
    saves: AtomicU64,
}

impl InMemorySnapshotStore {
    /// Create a store holding `snapshot`.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            saves: AtomicU64::new(0),
        }
    }

    /// Number of successful saves since creation.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Snapshot, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("snapshot.load"))?;
        Ok(state.clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("snapshot.save"))?;
        *state = snapshot.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
