//! Server-side time sources.
//!
//! Both the rate guard and the unlock engine read time through [`Clock`] so
//! that windows and record timestamps never depend on client-reported time,
//! and so tests can drive time explicitly.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// # Examples
///
/// ```
/// use coachvault::time::{Clock, ManualClock};
///
/// let clock = ManualClock::at_millis(0);
/// clock.advance_millis(1_500);
/// assert_eq!(clock.now_millis(), 1_500);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `millis` since the epoch.
    #[must_use]
    pub const fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Jumps to an absolute time.
    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Moves the clock forward.
    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::at_millis(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        assert_eq!(clock.now().timestamp_millis(), 1_000);

        clock.advance_millis(250);
        assert_eq!(clock.now_millis(), 1_250);

        clock.set_millis(42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn system_clock_is_close_to_now() {
        let before = Utc::now().timestamp_millis();
        let got = SystemClock.now_millis();
        let after = Utc::now().timestamp_millis();
        assert!(before <= got && got <= after);
    }
}
