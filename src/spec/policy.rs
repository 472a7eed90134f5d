//! Closed-set policy types shared by worker and supervisor specs.

// Layer 1: Standard library
use std::collections::VecDeque;
use std::time::Duration;

// Layer 2: Third-party crates
use chrono::{DateTime, Utc};

/// How a worker exited, independent of whether it is being restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// The body's future resolved successfully.
    Completed,
    /// The body's future resolved with an error.
    Failed,
    /// The body was cancelled and unwound cooperatively.
    Aborted,
}

/// When a terminated child should be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Always restart, regardless of completed/failed (never on abort).
    #[default]
    Permanent,
    /// Restart only on failure.
    Transient,
    /// Never restart.
    Temporary,
}

impl RestartPolicy {
    /// Applies the restart-decision table from the specification.
    pub fn should_restart(&self, exit: ExitKind) -> bool {
        match (self, exit) {
            (_, ExitKind::Aborted) => false,
            (RestartPolicy::Permanent, ExitKind::Completed | ExitKind::Failed) => true,
            (RestartPolicy::Transient, ExitKind::Failed) => true,
            (RestartPolicy::Transient, ExitKind::Completed) => false,
            (RestartPolicy::Temporary, _) => false,
        }
    }
}

/// How long a supervisor waits for a child to honor a cancellation signal
/// before declaring it failed-to-terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Wait forever.
    Indefinitely,
    /// Wait at most the given duration.
    Timeout(Duration),
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        ShutdownPolicy::Timeout(Duration::from_secs(5))
    }
}

impl ShutdownPolicy {
    /// The timeout to apply, if any.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            ShutdownPolicy::Indefinitely => None,
            ShutdownPolicy::Timeout(d) => Some(*d),
        }
    }
}

/// Direction in which a supervisor visits its children at start time.
/// Termination always proceeds in the strict reverse of actual start order,
/// regardless of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartOrder {
    /// Visit children in declaration order.
    #[default]
    LeftToRight,
    /// Visit children in reverse declaration order.
    RightToLeft,
}

/// Which siblings a supervisor restarts together when one of them needs
/// restarting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Restart only the affected child.
    #[default]
    OneForOne,
    /// Terminate every other child (reverse start order), then restart all
    /// children (start order).
    OneForAll,
    /// Terminate children started after the affected one (reverse start
    /// order), then restart the affected child and its successors (start
    /// order).
    RestForOne,
}

/// A restart-intensity budget: at most `max_restarts` restarts within the
/// trailing `window`. Exceeding it causes the owning supervisor to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartIntensity {
    pub(crate) max_restarts: u32,
    pub(crate) window: Duration,
}

impl RestartIntensity {
    /// Builds a new budget. `window` must be greater than zero; callers
    /// constructing a [`crate::spec::SupervisorSpec`] through the builder get
    /// this validated as `InvalidSpec` rather than panicking here.
    pub fn new(max_restarts: u32, window: Duration) -> Self {
        Self { max_restarts, window }
    }

    /// The configured maximum restart count.
    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    /// The configured trailing window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for RestartIntensity {
    /// The specification recommends `(1, 5s)` as a default, leaving the
    /// exact value implementation-defined.
    fn default() -> Self {
        Self::new(1, Duration::from_secs(5))
    }
}

/// A sliding-window tracker of recent restarts, owned by a single supervisor
/// instance (restart intensity is a supervisor-level property, not a
/// per-child one).
#[derive(Debug, Clone)]
pub struct RestartIntensityTracker {
    budget: RestartIntensity,
    history: VecDeque<DateTime<Utc>>,
}

impl RestartIntensityTracker {
    /// Creates a tracker enforcing `budget`.
    pub fn new(budget: RestartIntensity) -> Self {
        Self { budget, history: VecDeque::new() }
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) {
        let window = chrono::Duration::from_std(self.budget.window).unwrap_or(chrono::Duration::zero());
        while let Some(oldest) = self.history.front() {
            if now.signed_duration_since(*oldest) > window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records a restart at `now` and returns `true` if the budget has now
    /// been exceeded (strictly more than `max_restarts` restarts within the
    /// trailing window).
    pub fn record(&mut self, now: DateTime<Utc>) -> bool {
        self.evict_expired(now);
        self.history.push_back(now);
        self.history.len() as u32 > self.budget.max_restarts
    }

    /// The restart count currently inside the trailing window, as of the
    /// last [`RestartIntensityTracker::record`] call.
    pub fn count(&self) -> u32 {
        self.history.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_policy_decision_table() {
        assert!(RestartPolicy::Permanent.should_restart(ExitKind::Completed));
        assert!(RestartPolicy::Permanent.should_restart(ExitKind::Failed));
        assert!(!RestartPolicy::Permanent.should_restart(ExitKind::Aborted));

        assert!(!RestartPolicy::Transient.should_restart(ExitKind::Completed));
        assert!(RestartPolicy::Transient.should_restart(ExitKind::Failed));
        assert!(!RestartPolicy::Transient.should_restart(ExitKind::Aborted));

        assert!(!RestartPolicy::Temporary.should_restart(ExitKind::Completed));
        assert!(!RestartPolicy::Temporary.should_restart(ExitKind::Failed));
        assert!(!RestartPolicy::Temporary.should_restart(ExitKind::Aborted));
    }

    #[test]
    fn shutdown_policy_timeout() {
        assert_eq!(ShutdownPolicy::Indefinitely.timeout(), None);
        assert_eq!(
            ShutdownPolicy::Timeout(Duration::from_secs(3)).timeout(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn intensity_tracker_trips_after_exceeding_max() {
        let mut tracker = RestartIntensityTracker::new(RestartIntensity::new(1, Duration::from_secs(5)));
        let t0 = Utc::now();
        assert!(!tracker.record(t0));
        assert!(tracker.record(t0 + chrono::Duration::seconds(1)));
    }

    #[test]
    fn intensity_tracker_forgets_restarts_outside_window() {
        let mut tracker = RestartIntensityTracker::new(RestartIntensity::new(1, Duration::from_secs(5)));
        let t0 = Utc::now();
        assert!(!tracker.record(t0));
        assert!(!tracker.record(t0 + chrono::Duration::seconds(10)));
    }
}
