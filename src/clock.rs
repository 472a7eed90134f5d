//! A pluggable time source so duration-dependent logic (the health monitor's
//! delayed-restart detection, restart-intensity windows) can be tested
//! deterministically instead of racing against the wall clock.

// Layer 1: Standard library
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crates
use chrono::{DateTime, Utc};

/// A source of the current time.
///
/// The default implementation, [`SystemClock`], simply calls [`Utc::now`].
/// Tests that need to assert on age-based behavior (e.g. "this failure is
/// older than `max_allowed_restart_duration`") should supply a
/// [`ManualClock`] instead of sleeping in real time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The default [`Clock`], backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A [`Clock`] whose value is set explicitly by the caller.
///
/// Useful in tests that need to simulate a failure "aging past" a threshold
/// without an actual `sleep`.
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<parking_lot::Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock starting at `initial`.
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(parking_lot::Mutex::new(initial)),
        }
    }

    /// Overwrites the clock's current value.
    pub fn set(&self, value: DateTime<Utc>) {
        *self.inner.lock() = value;
    }

    /// Advances the clock by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.inner.lock();
        *guard += delta;
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock").field("now", &*self.inner.lock()).finish()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock()
    }
}

/// Returns a shared [`SystemClock`] instance, used as the default clock for
/// constructors that do not take one explicitly.
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn manual_clock_holds_value_until_advanced() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(30));
    }
}
