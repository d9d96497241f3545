//! The full persisted state: users, catalog, unlock history and economy.
//!
//! A snapshot is always loaded and saved as one unit. Field names follow the
//! on-disk document (`users`, `coaches`, `unlockHistory`, `gameConfig`).

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::economy::EconomyConfig;
use crate::item::{Item, ItemId};
use crate::record::{RecordId, UnlockRecord};
use crate::user::{User, UserId};

/// Aggregate document read and written by a [`SnapshotStore`](crate::storage::SnapshotStore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// All user accounts.
    #[serde(default)]
    pub users: Vec<User>,
    /// Catalog, in display order.
    #[serde(rename = "coaches", default)]
    pub items: Vec<Item>,
    /// Append-only unlock audit trail.
    #[serde(rename = "unlockHistory", default)]
    pub history: Vec<UnlockRecord>,
    /// Economy constants.
    #[serde(rename = "gameConfig", default)]
    pub economy: EconomyConfig,
}

impl Snapshot {
    /// Creates an empty snapshot with the given economy settings.
    #[must_use]
    pub fn new(economy: EconomyConfig) -> Self {
        Self {
            economy,
            ..Self::default()
        }
    }

    /// Adds a user (builder style, used by seeding and tests).
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    /// Adds a catalog item (builder style, used by seeding and tests).
    #[must_use]
    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    /// Looks up a user by id.
    #[must_use]
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    /// Looks up a catalog item by id.
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|i| &i.id == id)
    }

    /// Unlock records for `user`, in commit order.
    pub fn history_for<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a UnlockRecord> + 'a {
        self.history.iter().filter(move |r| &r.user_id == user)
    }

    /// Checks the structural invariants of the document.
    ///
    /// Returns every violation found; an empty list means the snapshot is
    /// consistent. Loading never fails on violations, callers decide.
    #[must_use]
    pub fn integrity_violations(&self) -> Vec<IntegrityViolation> {
        let mut out = Vec::new();

        let mut seen_users = HashSet::new();
        for user in &self.users {
            if !seen_users.insert(&user.id) {
                out.push(IntegrityViolation::DuplicateUser(user.id.clone()));
            }
        }

        let mut seen_items = HashSet::new();
        for item in &self.items {
            if !seen_items.insert(&item.id) {
                out.push(IntegrityViolation::DuplicateItem(item.id.clone()));
            }
        }

        let mut seen_records = HashSet::new();
        let mut per_pair: HashMap<(&UserId, &ItemId), usize> = HashMap::new();
        for rec in &self.history {
            if !seen_records.insert(&rec.id) {
                out.push(IntegrityViolation::DuplicateRecordId(rec.id.clone()));
            }
            *per_pair.entry((&rec.user_id, &rec.item_id)).or_default() += 1;
        }

        for user in &self.users {
            let mut owned = HashSet::new();
            for item in &user.unlocked_items {
                if !owned.insert(item) {
                    out.push(IntegrityViolation::DuplicateUnlock {
                        user: user.id.clone(),
                        item: item.clone(),
                    });
                }
                if !seen_items.contains(item) {
                    out.push(IntegrityViolation::UnknownItem {
                        user: user.id.clone(),
                        item: item.clone(),
                    });
                }
                match per_pair.get(&(&user.id, item)).copied().unwrap_or(0) {
                    0 => out.push(IntegrityViolation::MissingRecord {
                        user: user.id.clone(),
                        item: item.clone(),
                    }),
                    1 => {}
                    n => out.push(IntegrityViolation::DuplicateRecords {
                        user: user.id.clone(),
                        item: item.clone(),
                        count: n,
                    }),
                }
            }
        }

        for rec in &self.history {
            let owned = self
                .user(&rec.user_id)
                .is_some_and(|u| u.has_unlocked(&rec.item_id));
            if !owned {
                out.push(IntegrityViolation::OrphanRecord(rec.id.clone()));
            }
        }

        out
    }
}

/// A structural inconsistency found in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Two users share an id.
    DuplicateUser(UserId),
    /// Two catalog items share an id.
    DuplicateItem(ItemId),
    /// Two records share an id.
    DuplicateRecordId(RecordId),
    /// A user lists the same item twice.
    DuplicateUnlock {
        /// Owning user.
        user: UserId,
        /// Repeated item.
        item: ItemId,
    },
    /// A user owns an item that is not in the catalog.
    UnknownItem {
        /// Owning user.
        user: UserId,
        /// Missing item.
        item: ItemId,
    },
    /// A user owns an item with no audit record.
    MissingRecord {
        /// Owning user.
        user: UserId,
        /// Unrecorded item.
        item: ItemId,
    },
    /// More than one record exists for the same (user, item) pair.
    DuplicateRecords {
        /// Owning user.
        user: UserId,
        /// Item recorded more than once.
        item: ItemId,
        /// Number of records found.
        count: usize,
    },
    /// A record whose (user, item) pair is not reflected in the user's list.
    OrphanRecord(RecordId),
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateUser(id) => write!(f, "duplicate user id {id}"),
            Self::DuplicateItem(id) => write!(f, "duplicate item id {id}"),
            Self::DuplicateRecordId(id) => write!(f, "duplicate record id {id}"),
            Self::DuplicateUnlock { user, item } => {
                write!(f, "user {user} lists item {item} more than once")
            }
            Self::UnknownItem { user, item } => {
                write!(f, "user {user} owns unknown item {item}")
            }
            Self::MissingRecord { user, item } => {
                write!(f, "user {user} owns item {item} without an unlock record")
            }
            Self::DuplicateRecords { user, item, count } => {
                write!(f, "{count} unlock records for user {user} and item {item}")
            }
            Self::OrphanRecord(id) => write!(f, "record {id} has no matching unlock"),
        }
    }
}
