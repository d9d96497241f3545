//! Unlock audit records.
//!
//! A record is written exactly once, by a committed unlock, and is never
//! edited or removed afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::item::{Item, ItemId};
use crate::user::UserId;

/// Unique audit record identifier.
///
/// Fresh ids are random UUIDs; ids already present in a loaded document are
/// kept verbatim whatever their format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new random record ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable evidence of one committed unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRecord {
    /// Unique record id.
    pub id: RecordId,
    /// User who unlocked.
    pub user_id: UserId,
    /// Item that was unlocked.
    #[serde(rename = "coachId")]
    pub item_id: ItemId,
    /// Commit time (server clock).
    pub timestamp: DateTime<Utc>,
    /// Tokens debited.
    pub tokens_spent: u64,
    /// Xp credited.
    pub xp_gained: u64,
    /// Whether the item carried a risk flag when unlocked.
    #[serde(rename = "hasRedFlag")]
    pub had_risk_flag: bool,
}

impl UnlockRecord {
    pub(crate) fn for_unlock(
        user_id: UserId,
        item: &Item,
        xp_gained: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            user_id,
            item_id: item.id.clone(),
            timestamp,
            tokens_spent: item.unlock_cost,
            xp_gained,
            had_risk_flag: item.has_risk_flag,
        }
    }
}
