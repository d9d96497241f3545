//! The unlock write path, applied to an in-memory snapshot.
//!
//! [`apply_unlock`] validates first and mutates last: every failure returns
//! before the snapshot is touched, so a failed call leaves it byte-for-byte
//! unchanged.

use chrono::{DateTime, Utc};

use crate::error::{EntityKind, PreconditionFailure, UnlockError};
use crate::item::{Item, ItemId};
use crate::record::UnlockRecord;
use crate::snapshot::Snapshot;
use crate::user::{User, UserId};

/// Result of a committed unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockOutcome {
    /// The user after the debit and credit.
    pub user: User,
    /// The item that was unlocked.
    pub item: Item,
    /// The audit record appended for this unlock.
    pub record: UnlockRecord,
    /// Whether the presentation layer should show the risk warning.
    pub requires_risk_acknowledgement: bool,
}

/// Checks the unlock rules for `user` and `item`, first failure wins.
pub fn check_preconditions(user: &User, item: &Item) -> Result<(), PreconditionFailure> {
    if !item.available {
        return Err(PreconditionFailure::Unavailable);
    }
    if user.has_unlocked(&item.id) {
        return Err(PreconditionFailure::AlreadyUnlocked);
    }
    if !user.can_afford(item.unlock_cost) {
        return Err(PreconditionFailure::InsufficientFunds {
            required: item.unlock_cost,
            available: user.tokens,
        });
    }
    Ok(())
}

/// Validates and applies one unlock to `snapshot`.
///
/// On success the user has paid exactly `item.unlock_cost`, gained exactly
/// `economy.xp_per_unlock`, owns the item, and one record has been appended.
pub fn apply_unlock(
    snapshot: &mut Snapshot,
    user_id: &UserId,
    item_id: &ItemId,
    now: DateTime<Utc>,
) -> Result<UnlockOutcome, UnlockError> {
    let user_idx = snapshot
        .users
        .iter()
        .position(|u| &u.id == user_id)
        .ok_or_else(|| UnlockError::not_found(EntityKind::User, user_id.as_str()))?;
    let item = snapshot
        .item(item_id)
        .ok_or_else(|| UnlockError::not_found(EntityKind::Item, item_id.as_str()))?
        .clone();

    let xp_award = snapshot.economy.xp_per_unlock;
    let user = &snapshot.users[user_idx];
    check_preconditions(user, &item)?;

    let tokens = user.tokens - item.unlock_cost;
    let xp = user
        .xp
        .checked_add(xp_award)
        .ok_or_else(|| UnlockError::internal(format!("xp overflow for user {user_id}")))?;

    let user = &mut snapshot.users[user_idx];
    user.tokens = tokens;
    user.xp = xp;
    user.unlocked_items.push(item.id.clone());
    let user = user.clone();

    let record = UnlockRecord::for_unlock(user_id.clone(), &item, xp_award, now);
    snapshot.history.push(record.clone());

    Ok(UnlockOutcome {
        user,
        requires_risk_acknowledgement: item.has_risk_flag,
        item,
        record,
    })
}
