//! User accounts and their token/xp balances.
//!
//! A user's balances only move through the unlock engine: tokens go down by
//! exactly an item's cost, xp goes up by exactly the configured award, and
//! the unlocked list only grows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::item::ItemId;

/// Stable user identifier as stored in the snapshot document.
///
/// # Examples
///
/// ```
/// use coachvault::UserId;
///
/// let id = UserId::new("user-1");
/// assert_eq!(id.as_str(), "user-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Spendable balance. Unsigned, so it can never go negative.
    pub tokens: u64,
    /// Experience points. Never decreases.
    pub xp: u64,
    /// Items this user owns, in unlock order. Never shrinks.
    #[serde(rename = "unlockedCoaches", default)]
    pub unlocked_items: Vec<ItemId>,
}

impl User {
    /// Creates a user with the given starting balance and nothing unlocked.
    #[must_use]
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, tokens: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tokens,
            xp: 0,
            unlocked_items: Vec::new(),
        }
    }

    /// Returns true if the user already owns `item`.
    #[must_use]
    pub fn has_unlocked(&self, item: &ItemId) -> bool {
        self.unlocked_items.contains(item)
    }

    /// Returns true if the balance covers `cost`.
    #[must_use]
    pub const fn can_afford(&self, cost: u64) -> bool {
        self.tokens >= cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_with_document_field_names() {
        let mut user = User::new("u1", "Ana", 10);
        user.unlocked_items.push(ItemId::new("c1"));

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["tokens"], 10);
        assert_eq!(json["unlockedCoaches"][0], "c1");

        let back: User = serde_json::from_value(json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn missing_unlocked_list_defaults_to_empty() {
        let user: User =
            serde_json::from_str(r#"{"id":"u2","name":"Bo","tokens":3,"xp":7}"#).unwrap();
        assert!(user.unlocked_items.is_empty());
        assert_eq!(user.xp, 7);
    }

    #[test]
    fn negative_balance_is_rejected_at_the_boundary() {
        let res: Result<User, _> =
            serde_json::from_str(r#"{"id":"u3","name":"Cy","tokens":-1,"xp":0}"#);
        assert!(res.is_err());
    }

    #[test]
    fn affordability_and_ownership() {
        let mut user = User::new("u4", "Di", 5);
        assert!(user.can_afford(5));
        assert!(!user.can_afford(6));

        let item = ItemId::new("c9");
        assert!(!user.has_unlocked(&item));
        user.unlocked_items.push(item.clone());
        assert!(user.has_unlocked(&item));
    }
}
