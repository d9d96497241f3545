//! Fixed-window request guard.
//!
//! The guard counts admissions per key inside fixed windows:
//!
//! - no window for the key, or the window has expired: open a new window with
//!   a count of one and admit;
//! - window open and `count < max_requests`: increment and admit;
//! - otherwise reject with the time left until the window resets.
//!
//! Fixed windows let up to `2 × max_requests` requests through around a window
//! boundary (a burst at the end of one window followed by a burst at the start
//! of the next). This is a known limitation of the algorithm, traded for O(1)
//! state per key.
//!
//! The window table is bounded by [`GuardConfig::max_keys`]; expired windows
//! are swept when the table is full and can also be swept on a timer with
//! [`RateGuard::sweep_expired`].

mod policy;

pub use policy::{default_key, unlock_key, GuardPolicy, KeyFn, RequestContext};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::error::{UnlockError, ValidationError};
use crate::time::{Clock, SystemClock};

/// Window length and admission budget for one protected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Admissions allowed per window.
    pub max_requests: u32,
}

impl RateLimit {
    const MIN_WINDOW_MS: u64 = 1;

    /// Unlock window used when nothing else is configured.
    pub const UNLOCK_WINDOW_MS: u64 = 5_000;
    /// Unlock admissions per window used when nothing else is configured.
    pub const UNLOCK_MAX_REQUESTS: u32 = 1;

    /// Creates a limit.
    #[must_use]
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// The default unlock limit: one request per five seconds.
    #[must_use]
    pub const fn unlock_default() -> Self {
        Self::new(Self::UNLOCK_WINDOW_MS, Self::UNLOCK_MAX_REQUESTS)
    }

    /// Rejects empty windows and zero budgets.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.window_ms < Self::MIN_WINDOW_MS {
            return Err(ValidationError::WindowTooShort {
                min_ms: Self::MIN_WINDOW_MS,
                actual_ms: self.window_ms,
            });
        }
        if self.max_requests == 0 {
            return Err(ValidationError::ZeroMaxRequests);
        }
        Ok(self)
    }
}

/// Guard-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    /// Maximum number of live windows held at once.
    pub max_keys: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_keys: Self::DEFAULT_MAX_KEYS,
        }
    }
}

impl GuardConfig {
    const MIN_KEYS: usize = 1;

    /// Window table capacity used when nothing else is configured.
    pub const DEFAULT_MAX_KEYS: usize = 100_000;

    /// Rejects a table that cannot hold a single window.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.max_keys < Self::MIN_KEYS {
            return Err(ValidationError::GuardCapacityTooSmall {
                min: Self::MIN_KEYS,
                actual: self.max_keys,
            });
        }
        Ok(self)
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed.
    Allowed,
    /// The request must not proceed before `retry_after_ms` has elapsed.
    Rejected {
        /// Milliseconds until the key's window resets.
        retry_after_ms: u64,
    },
}

impl Admission {
    /// Returns true if the request was admitted.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Returned by [`RateGuard::guard`] when admission is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limit exceeded, retry after {retry_after_ms}ms")]
pub struct RateLimitExceeded {
    /// Milliseconds until the key's window resets.
    pub retry_after_ms: u64,
}

impl From<RateLimitExceeded> for UnlockError {
    fn from(e: RateLimitExceeded) -> Self {
        Self::RateLimited {
            retry_after_ms: e.retry_after_ms,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_reset_ms: i64,
}

impl RateWindow {
    fn open(now_ms: i64, limit: &RateLimit) -> Self {
        let window = i64::try_from(limit.window_ms).unwrap_or(i64::MAX);
        Self {
            count: 1,
            window_reset_ms: now_ms.saturating_add(window),
        }
    }

    const fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.window_reset_ms
    }
}

/// Thread-safe fixed-window rate guard.
///
/// One guard can protect many operations; each operation supplies its own
/// [`GuardPolicy`]. All window updates happen under a single lock, so two
/// concurrent requests can never both observe spare capacity for the last
/// slot of a window.
pub struct RateGuard {
    windows: Mutex<HashMap<String, RateWindow>>,
    config: GuardConfig,
    clock: Arc<dyn Clock>,
}

impl RateGuard {
    /// Creates a guard that reads the system clock.
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a guard with an explicit clock.
    #[must_use]
    pub fn with_clock(config: GuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Checks and records one request for `key`.
    pub fn admit(&self, key: &str, limit: &RateLimit) -> Admission {
        let now_ms = self.clock.now_millis();
        // Every mutation below leaves the table consistent, so a poisoned
        // lock is still safe to use.
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(window) = windows.get_mut(key) {
            if window.is_expired(now_ms) {
                *window = RateWindow::open(now_ms, limit);
                debug!(key, "rate window reopened");
                return Admission::Allowed;
            }
            if window.count < limit.max_requests {
                window.count += 1;
                debug!(key, count = window.count, "request admitted");
                return Admission::Allowed;
            }
            let retry_after_ms = u64::try_from(window.window_reset_ms - now_ms).unwrap_or(0);
            debug!(key, retry_after_ms, "request rejected");
            return Admission::Rejected { retry_after_ms };
        }

        if windows.len() >= self.config.max_keys {
            make_room(&mut windows, now_ms, self.config.max_keys);
        }
        windows.insert(key.to_string(), RateWindow::open(now_ms, limit));
        debug!(key, "rate window opened");
        Admission::Allowed
    }

    /// Runs `op` only if `ctx` is admitted under `policy`.
    ///
    /// A rejected request never reaches `op`.
    pub fn guard<T, E, F>(&self, policy: &GuardPolicy, ctx: &RequestContext, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RateLimitExceeded>,
    {
        let key = policy.key_for(ctx);
        match self.admit(&key, &policy.limit) {
            Admission::Allowed => op(),
            Admission::Rejected { retry_after_ms } => {
                Err(RateLimitExceeded { retry_after_ms }.into())
            }
        }
    }

    /// Drops every expired window and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now_ms = self.clock.now_millis();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, w| !w.is_expired(now_ms));
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "swept expired rate windows");
        }
        removed
    }

    /// Number of windows currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no windows are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Frees at least one slot: expired windows first, then the window closest to
/// its reset.
fn make_room(windows: &mut HashMap<String, RateWindow>, now_ms: i64, max_keys: usize) {
    windows.retain(|_, w| !w.is_expired(now_ms));
    if windows.len() < max_keys {
        return;
    }
    if let Some(oldest) = windows
        .iter()
        .min_by_key(|(_, w)| w.window_reset_ms)
        .map(|(k, _)| k.clone())
    {
        windows.remove(&oldest);
        debug!(key = %oldest, "evicted rate window at capacity");
    }
}
