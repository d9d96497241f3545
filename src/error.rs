//! Error types for coachvault.
//!
//! All errors are strongly typed using thiserror so callers can pattern
//! match on the exact failure and the HTTP layer can map each kind to a
//! distinct response.

use std::fmt;

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors raised while checking configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A rate window shorter than the minimum.
    #[error("Rate limit window must be at least {min_ms}ms (got {actual_ms}ms)")]
    WindowTooShort {
        /// Smallest accepted window.
        min_ms: u64,
        /// Configured window.
        actual_ms: u64,
    },

    /// A rate limit that admits nothing.
    #[error("Rate limit must admit at least one request per window")]
    ZeroMaxRequests,

    /// A guard table too small to hold a window.
    #[error("Rate guard capacity must be at least {min} keys (got {actual})")]
    GuardCapacityTooSmall {
        /// Smallest accepted capacity.
        min: usize,
        /// Configured capacity.
        actual: usize,
    },

    /// Any other out-of-range setting.
    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField {
        /// Name of the setting.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Which kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A user account.
    User,
    /// A catalog item (coach).
    Item,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Item => write!(f, "Item"),
        }
    }
}

/// Business rule that rejected an unlock.
///
/// Checks run in declaration order and the first failure wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionFailure {
    /// The item is not currently offered.
    Unavailable,
    /// The user already owns the item.
    AlreadyUnlocked,
    /// The user cannot afford the item.
    InsufficientFunds {
        /// Tokens the item costs.
        required: u64,
        /// Tokens the user holds.
        available: u64,
    },
}

impl PreconditionFailure {
    /// Stable machine-readable code for the failed rule.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::AlreadyUnlocked => "already_unlocked",
            Self::InsufficientFunds { .. } => "insufficient_funds",
        }
    }
}

impl fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Item is not available"),
            Self::AlreadyUnlocked => write!(f, "Item already unlocked"),
            Self::InsufficientFunds { required, available } => {
                write!(f, "Insufficient tokens: need {required}, have {available}")
            }
        }
    }
}

/// Errors returned by the unlock path (guard, engine, store).
#[derive(Debug, Error)]
pub enum UnlockError {
    /// The user or item does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Which kind of record was looked up.
        entity: EntityKind,
        /// The id that was not found.
        id: String,
    },

    /// A business rule rejected the unlock.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(PreconditionFailure),

    /// The guard rejected the request.
    #[error("Rate limit exceeded. Try again in {} seconds.", secs_ceil(.retry_after_ms))]
    RateLimited {
        /// Milliseconds until the window resets.
        retry_after_ms: u64,
    },

    /// The store could not load or save; nothing was committed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    /// An invariant broke inside the engine.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

/// Rounds a millisecond delay up to whole seconds.
#[must_use]
pub const fn retry_after_secs(retry_after_ms: u64) -> u64 {
    retry_after_ms.div_ceil(1000)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn secs_ceil(retry_after_ms: &u64) -> u64 {
    retry_after_secs(*retry_after_ms)
}

impl UnlockError {
    /// Creates a not-found error for the given kind and id.
    #[must_use]
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the failed precondition, if this is a business-rule rejection.
    #[must_use]
    pub const fn precondition(&self) -> Option<PreconditionFailure> {
        match self {
            Self::PreconditionFailed(p) => Some(*p),
            _ => None,
        }
    }

    /// Returns true if a caller may retry the same request later.
    ///
    /// Nothing retries internally; this only informs the caller's policy.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::StoreUnavailable(_))
    }
}

impl From<PreconditionFailure> for UnlockError {
    fn from(p: PreconditionFailure) -> Self {
        Self::PreconditionFailed(p)
    }
}

/// Top-level error type for coachvault.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Invalid configuration.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An unlock failed.
    #[error("Unlock error: {0}")]
    Unlock(#[from] UnlockError),

    /// The store failed to open or operate.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl VaultError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Internal { .. } => false,
            Self::Unlock(e) => e.is_retryable(),
            Self::Storage(_) => true,
        }
    }
}

/// Result type alias for coachvault operations.
pub type VaultResult<T> = Result<T, VaultError>;
