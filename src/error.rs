//! Error taxonomy for the supervision tree.
//!
//! Mirrors the propagation policy in the specification's error handling
//! design: construction errors ([`SupervisorError::InvalidSpec`]) never
//! escape as events, start failures always bubble to the parent, and a
//! supervisor that exhausts its restart budget reports itself failed to its
//! own parent rather than recovering locally.

// Layer 1: Standard library
use std::time::Duration;

// Layer 2: Third-party crates
use thiserror::Error;

/// A boxed worker error, matching the crate-wide convention of not
/// constraining the concrete error type a worker body may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while building, starting, monitoring or tearing down a
/// supervision tree.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Construction-time validation failure. Never emitted as an event.
    #[error("invalid node spec: {reason}")]
    InvalidSpec {
        /// Human-readable description of the violated invariant.
        reason: String,
    },

    /// A descendant failed to start.
    #[error("child '{path}' failed to start")]
    StartFailed {
        /// Full path of the child that failed to start.
        path: String,
        /// The underlying cause, when the failing node is a worker.
        #[source]
        source: Option<BoxError>,
    },

    /// A worker body returned a failure outcome.
    #[error("worker '{path}' failed")]
    WorkerFailed {
        /// Full path of the worker.
        path: String,
        /// The error the worker body returned, when known (a panicking
        /// worker task is reported through this variant too, via its
        /// [`std::any::Any`] payload converted to a string).
        #[source]
        source: Option<BoxError>,
    },

    /// A child did not terminate within its `shutdown_policy`.
    #[error("child '{path}' did not terminate within its shutdown timeout of {timeout:?}")]
    ShutdownTimeout {
        /// Full path of the child that failed to terminate in time.
        path: String,
        /// The configured timeout that elapsed.
        timeout: Duration,
    },

    /// A supervisor exceeded its restart-intensity budget.
    #[error(
        "supervisor '{path}' exceeded its restart intensity: {count} restarts within {window:?} (limit {max})"
    )]
    RestartIntensityExceeded {
        /// Full path of the supervisor that exceeded its budget.
        path: String,
        /// Observed restart count within the trailing window.
        count: u32,
        /// The configured maximum.
        max: u32,
        /// The configured trailing window.
        window: Duration,
    },

    /// One or more descendants failed to terminate cleanly during shutdown.
    #[error("supervisor '{path}' failed to terminate cleanly")]
    TerminationFailed {
        /// Full path of the supervisor reporting the aggregate failure.
        path: String,
    },
}

impl SupervisorError {
    /// Returns `true` for errors that should never be locally recovered by
    /// the reporting supervisor and must always bubble to the parent
    /// (construction errors and restart-intensity exhaustion).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SupervisorError::InvalidSpec { .. } | SupervisorError::RestartIntensityExceeded { .. }
        )
    }

    /// The path of the node the error concerns, when one is known.
    pub fn path(&self) -> Option<&str> {
        match self {
            SupervisorError::InvalidSpec { .. } => None,
            SupervisorError::StartFailed { path, .. }
            | SupervisorError::WorkerFailed { path, .. }
            | SupervisorError::ShutdownTimeout { path, .. }
            | SupervisorError::RestartIntensityExceeded { path, .. }
            | SupervisorError::TerminationFailed { path } => Some(path),
        }
    }

    /// A copy of this error suitable for attaching to an [`crate::event::Event`]
    /// when the original must still be propagated or returned by value.
    ///
    /// Source chains are not reproduced (the underlying worker or start
    /// error is not `Clone`), only the path and message; the original,
    /// full-fidelity error is always what gets returned/propagated to the
    /// caller, this copy is strictly for the best-effort notifier sink.
    pub(crate) fn snapshot(&self) -> SupervisorError {
        match self {
            SupervisorError::InvalidSpec { reason } => {
                SupervisorError::InvalidSpec { reason: reason.clone() }
            }
            SupervisorError::StartFailed { path, .. } => {
                SupervisorError::StartFailed { path: path.clone(), source: None }
            }
            SupervisorError::WorkerFailed { path, .. } => {
                SupervisorError::WorkerFailed { path: path.clone(), source: None }
            }
            SupervisorError::ShutdownTimeout { path, timeout } => {
                SupervisorError::ShutdownTimeout { path: path.clone(), timeout: *timeout }
            }
            SupervisorError::RestartIntensityExceeded { path, count, max, window } => {
                SupervisorError::RestartIntensityExceeded {
                    path: path.clone(),
                    count: *count,
                    max: *max,
                    window: *window,
                }
            }
            SupervisorError::TerminationFailed { path } => {
                SupervisorError::TerminationFailed { path: path.clone() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_spec_and_restart_intensity_are_fatal() {
        let invalid = SupervisorError::InvalidSpec { reason: "empty name".into() };
        assert!(invalid.is_fatal());

        let exceeded = SupervisorError::RestartIntensityExceeded {
            path: "root".into(),
            count: 2,
            max: 1,
            window: Duration::from_secs(5),
        };
        assert!(exceeded.is_fatal());
    }

    #[test]
    fn worker_failed_is_not_fatal_and_carries_path() {
        let err = SupervisorError::WorkerFailed {
            path: "root/one".into(),
            source: Some("boom".into()),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.path(), Some("root/one"));
    }

    #[test]
    fn snapshot_drops_source_but_keeps_path_and_message() {
        let err = SupervisorError::WorkerFailed {
            path: "root/one".into(),
            source: Some("boom".into()),
        };
        let snapshot = err.snapshot();
        assert_eq!(snapshot.path(), Some("root/one"));
        assert_eq!(snapshot.to_string(), err.to_string());
    }
}
