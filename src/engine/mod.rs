//! Unlock transaction engine.
//!
//! This module provides a synchronous executor that applies unlocks against a
//! pluggable [`SnapshotStore`]. Each unlock is one full
//! load → validate → mutate → save cycle, and the engine runs at most one
//! such cycle at a time.
//!
//! The store only knows whole documents, so two interleaved cycles would each
//! save a copy built from the same stale load: one user could be charged twice
//! against one balance, or one user's unlock could overwrite another's. A
//! single commit lock per engine closes both gaps. Reads do not take it.

mod write_path;

pub use write_path::{apply_unlock, check_preconditions, UnlockOutcome};

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{EntityKind, UnlockError};
use crate::item::{Item, ItemId};
use crate::record::UnlockRecord;
use crate::storage::SnapshotStore;
use crate::time::{Clock, SystemClock};
use crate::user::{User, UserId};

/// Unlock execution engine.
#[derive(Clone)]
pub struct UnlockEngine {
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    commit: Arc<Mutex<()>>,
}

impl UnlockEngine {
    /// Create a new engine over `store`, stamping records with the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create a new engine with an explicit clock.
    #[must_use]
    pub fn with_clock(store: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            commit: Arc::new(Mutex::new(())),
        }
    }

    /// The full catalog, in document order.
    pub fn catalog(&self) -> Result<Vec<Item>, UnlockError> {
        Ok(self.store.load()?.items)
    }

    /// Look up one user.
    pub fn user(&self, id: &UserId) -> Result<User, UnlockError> {
        self.store
            .load()?
            .user(id)
            .cloned()
            .ok_or_else(|| UnlockError::not_found(EntityKind::User, id.as_str()))
    }

    /// Unlock records for one user, in commit order.
    pub fn history_for(&self, id: &UserId) -> Result<Vec<UnlockRecord>, UnlockError> {
        let snapshot = self.store.load()?;
        if snapshot.user(id).is_none() {
            return Err(UnlockError::not_found(EntityKind::User, id.as_str()));
        }
        Ok(snapshot.history_for(id).cloned().collect())
    }

    /// Validate, apply and persist one unlock.
    ///
    /// Either the whole unlock is saved or nothing is: the mutation is made
    /// on a private copy of the snapshot that is dropped if `save` fails.
    pub fn unlock(&self, user_id: &UserId, item_id: &ItemId) -> Result<UnlockOutcome, UnlockError> {
        // The lock guards no in-memory state, only the store cycle, so a
        // poisoned lock is still usable.
        let _commit = self.commit.lock().unwrap_or_else(PoisonError::into_inner);

        let mut snapshot = self.store.load()?;
        let outcome = match apply_unlock(&mut snapshot, user_id, item_id, self.clock.now()) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(user = %user_id, item = %item_id, error = %e, "unlock rejected");
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&snapshot) {
            warn!(user = %user_id, item = %item_id, error = %e, "unlock not committed");
            return Err(e.into());
        }

        info!(
            user = %user_id,
            item = %item_id,
            tokens_spent = outcome.record.tokens_spent,
            xp_gained = outcome.record.xp_gained,
            risk_flag = outcome.requires_risk_acknowledgement,
            record = %outcome.record.id,
            "unlock committed"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::economy::EconomyConfig;
    use crate::error::PreconditionFailure;
    use crate::snapshot::Snapshot;
    use crate::storage::{InMemorySnapshotStore, StorageError};
    use crate::time::ManualClock;

    fn seeded() -> Arc<InMemorySnapshotStore> {
        Arc::new(InMemorySnapshotStore::new(
            Snapshot::new(EconomyConfig::default())
                .with_user(User::new("u1", "Ana", 10))
                .with_item(Item::new("c1", "Coach One", 4))
                .with_item(Item::new("c2", "Coach Two", 4)),
        ))
    }

    struct RejectingStore {
        inner: InMemorySnapshotStore,
    }

    impl SnapshotStore for RejectingStore {
        fn load(&self) -> Result<Snapshot, StorageError> {
            self.inner.load()
        }

        fn save(&self, _snapshot: &Snapshot) -> Result<(), StorageError> {
            Err(StorageError::BackendError("read-only".to_string()))
        }
    }

    #[test]
    fn unlock_persists_exactly_once() {
        let store = seeded();
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let engine = UnlockEngine::with_clock(store.clone(), clock);

        let out = engine
            .unlock(&UserId::new("u1"), &ItemId::new("c1"))
            .unwrap();
        assert_eq!(out.user.tokens, 6);
        assert_eq!(out.record.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(store.save_count(), 1);

        let persisted = store.load().unwrap();
        assert_eq!(persisted.users[0].tokens, 6);
        assert_eq!(persisted.history.len(), 1);
    }

    #[test]
    fn rejected_unlock_does_not_save() {
        let store = seeded();
        let engine = UnlockEngine::new(store.clone());

        engine
            .unlock(&UserId::new("u1"), &ItemId::new("c1"))
            .unwrap();
        let err = engine
            .unlock(&UserId::new("u1"), &ItemId::new("c1"))
            .unwrap_err();
        assert_eq!(err.precondition(), Some(PreconditionFailure::AlreadyUnlocked));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn failed_save_is_not_committed() {
        let store = Arc::new(RejectingStore {
            inner: InMemorySnapshotStore::new(seeded().load().unwrap()),
        });
        let engine = UnlockEngine::new(store.clone());

        let err = engine
            .unlock(&UserId::new("u1"), &ItemId::new("c1"))
            .unwrap_err();
        assert!(matches!(err, UnlockError::StoreUnavailable(_)));

        let after = store.load().unwrap();
        assert_eq!(after.users[0].tokens, 10);
        assert!(after.users[0].unlocked_items.is_empty());
        assert!(after.history.is_empty());
    }

    #[test]
    fn reads_resolve_users_catalog_and_history() {
        let engine = UnlockEngine::new(seeded());

        assert_eq!(engine.catalog().unwrap().len(), 2);
        assert_eq!(engine.user(&UserId::new("u1")).unwrap().name, "Ana");
        assert!(matches!(
            engine.user(&UserId::new("nobody")),
            Err(UnlockError::NotFound { entity: EntityKind::User, .. })
        ));

        engine
            .unlock(&UserId::new("u1"), &ItemId::new("c2"))
            .unwrap();
        let history = engine.history_for(&UserId::new("u1")).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].item_id, ItemId::new("c2"));
        assert!(engine.history_for(&UserId::new("nobody")).is_err());
    }
}
