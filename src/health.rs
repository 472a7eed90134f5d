//! A pure, passive consumer of the event stream that reports on the overall
//! health of a tree without ever feeding back into supervision decisions.
//!
//! Ported behavior-for-behavior from the reference health-check monitor: a
//! path is considered failed once a `*Failed` event for it has been
//! observed, and stays failed until the *same path* reports started again —
//! including a started event produced by the supervisor's own restart, not
//! just a first-time start. Two independent thresholds then classify the
//! current failure set into a [`HealthReport`].

// Layer 1: Standard library
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crates
use parking_lot::Mutex;

// Layer 3: Internal modules
use crate::clock::{system_clock, Clock};
use crate::event::{Event, EventNotifier};

/// A snapshot of tree health at the moment [`HealthMonitor::health_report`]
/// was called.
///
/// The two sets are computed independently of one another: a path can appear
/// in neither, either, or both, depending on how many failures it has
/// accumulated and how long the most recent one has been outstanding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    failed_processes: Vec<String>,
    delayed_restart_processes: Vec<String>,
}

impl HealthReport {
    /// The empty report, equivalent to the reference implementation's
    /// `HealthyReport` sentinel value.
    pub fn healthy() -> Self {
        Self::default()
    }

    /// Paths whose accumulated failure count exceeds the configured
    /// threshold.
    pub fn failed_processes(&self) -> &[String] {
        &self.failed_processes
    }

    /// Paths whose most recent recorded failure has been outstanding longer
    /// than the configured restart-delay threshold.
    pub fn delayed_restart_processes(&self) -> &[String] {
        &self.delayed_restart_processes
    }

    /// `true` iff both sets are empty.
    pub fn is_healthy(&self) -> bool {
        self.failed_processes.is_empty() && self.delayed_restart_processes.is_empty()
    }
}

struct Inner {
    failed: HashMap<String, Event>,
}

/// Tracks outstanding failures across a tree and classifies them against two
/// independently-configured thresholds.
///
/// Implements [`EventNotifier`] so it composes with any other sink through
/// [`crate::event::CompositeNotifier`] or
/// [`crate::spec::builder::SupervisorSpecBuilder::with_notifier`] — install
/// it alongside a logging notifier rather than in place of one.
pub struct HealthMonitor {
    max_allowed_failures: usize,
    max_allowed_restart_duration: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl HealthMonitor {
    /// Builds a monitor using the system wall clock.
    pub fn new(max_allowed_failures: usize, max_allowed_restart_duration: Duration) -> Self {
        Self::with_clock(max_allowed_failures, max_allowed_restart_duration, system_clock())
    }

    /// Builds a monitor against an explicit [`Clock`], for deterministic
    /// tests of the restart-duration threshold.
    pub fn with_clock(
        max_allowed_failures: usize,
        max_allowed_restart_duration: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            max_allowed_failures,
            max_allowed_restart_duration,
            clock,
            inner: Mutex::new(Inner { failed: HashMap::new() }),
        }
    }

    /// Records `event`, exactly as [`EventNotifier::notify`] would, without
    /// requiring a trait object. Useful for tests that hold a concrete
    /// `HealthMonitor` rather than an `Arc<dyn EventNotifier>`.
    pub fn handle_event(&self, event: &Event) {
        let mut inner = self.inner.lock();
        if event.tag.is_failure() {
            inner.failed.insert(event.node_path.clone(), event.clone());
        } else if event.tag.is_started() {
            inner.failed.remove(&event.node_path);
        }
    }

    /// Computes the current [`HealthReport`].
    ///
    /// The two sets are built independently, mirroring the reference
    /// monitor: `failed_processes` only once the failure count for a path
    /// exceeds `max_allowed_failures`; `delayed_restart_processes` for any
    /// outstanding failure whose age exceeds `max_allowed_restart_duration`,
    /// regardless of how many times it has failed.
    pub fn health_report(&self) -> HealthReport {
        let inner = self.inner.lock();
        if inner.failed.is_empty() {
            return HealthReport::healthy();
        }

        let mut failed_processes = Vec::new();
        let mut delayed_restart_processes = Vec::new();
        let now = self.clock.now();

        if inner.failed.len() > self.max_allowed_failures {
            failed_processes = inner.failed.keys().cloned().collect();
            failed_processes.sort();
        }

        for (path, event) in inner.failed.iter() {
            let age = now.signed_duration_since(event.timestamp);
            let threshold = chrono::Duration::from_std(self.max_allowed_restart_duration)
                .unwrap_or(chrono::Duration::zero());
            if age > threshold {
                delayed_restart_processes.push(path.clone());
            }
        }
        delayed_restart_processes.sort();

        HealthReport { failed_processes, delayed_restart_processes }
    }

    /// `true` iff [`HealthMonitor::health_report`] would be empty.
    pub fn is_healthy(&self) -> bool {
        self.health_report().is_healthy()
    }
}

impl EventNotifier for HealthMonitor {
    fn notify(&self, event: &Event) {
        self.handle_event(event);
    }
}
