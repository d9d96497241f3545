//! Catalog items (coaches).
//!
//! Items are provisioned outside this crate; the engine only reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable catalog item identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
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

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A coach that can be unlocked from the catalog.
///
/// The risk flag is informational: it tells the presentation layer to ask
/// for acknowledgement after the fact and never blocks an unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Stable identifier.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Coaching position (display only).
    #[serde(default)]
    pub position: String,
    /// School (display only).
    #[serde(default)]
    pub school: String,
    /// Whether the item can currently be unlocked.
    pub available: bool,
    /// Tokens charged on unlock.
    pub unlock_cost: u64,
    /// Whether the presentation layer should warn after unlocking.
    #[serde(rename = "hasRedFlag", default)]
    pub has_risk_flag: bool,
    /// Human-readable reason for the risk flag.
    #[serde(rename = "redFlagReason", default, skip_serializing_if = "Option::is_none")]
    pub risk_reason: Option<String>,
}

impl Item {
    /// Creates an available, unflagged item.
    #[must_use]
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, unlock_cost: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position: String::new(),
            school: String::new(),
            available: true,
            unlock_cost,
            has_risk_flag: false,
            risk_reason: None,
        }
    }

    /// Marks the item as carrying a risk flag with the given reason.
    #[must_use]
    pub fn with_risk_flag(mut self, reason: impl Into<String>) -> Self {
        self.has_risk_flag = true;
        self.risk_reason = Some(reason.into());
        self
    }

    /// Sets the availability flag.
    #[must_use]
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }
}
