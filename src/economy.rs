//! Global economy constants.

use serde::{Deserialize, Serialize};

/// Default xp granted per unlock.
pub const DEFAULT_XP_PER_UNLOCK: u64 = 10;

/// Default nominal token cost per unlock.
pub const DEFAULT_TOKEN_COST_PER_UNLOCK: u64 = 1;

/// Economy settings stored alongside the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomyConfig {
    /// Xp credited for every committed unlock.
    pub xp_per_unlock: u64,
    /// Nominal cost shown to clients. The engine always charges the item's
    /// own `unlock_cost`.
    #[serde(default = "default_token_cost")]
    pub token_cost_per_unlock: u64,
}

const fn default_token_cost() -> u64 {
    DEFAULT_TOKEN_COST_PER_UNLOCK
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            xp_per_unlock: DEFAULT_XP_PER_UNLOCK,
            token_cost_per_unlock: DEFAULT_TOKEN_COST_PER_UNLOCK,
        }
    }
}
