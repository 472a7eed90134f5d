//! The live counterpart of a [`NodeSpec`](crate::spec::NodeSpec) tree: tasks,
//! cancellation handles, and the supervisor state machine that starts,
//! monitors, restarts and tears them down.

// Module declarations
pub mod strategy;
pub mod supervisor;

// Re-exports for convenient access
pub use supervisor::{run_monitor_loop, start_tree, terminate_tree, SupervisorRuntime};

// Layer 1: Standard library
use std::fmt;

// Layer 2: Third-party crates
// (tokio types used further down in supervisor.rs)

// Layer 3: Internal modules
use crate::error::SupervisorError;
use crate::spec::{ExitKind, WorkerOutcome};

/// A stable per-child key, derived from its declared name (sibling names
/// are validated unique at spec-construction time, so the name alone is
/// sufficient — unlike the teacher's actor registry, this tree has no need
/// for globally-unique identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildId(pub String);

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChildId {
    fn from(value: &str) -> Self {
        ChildId(value.to_string())
    }
}

/// The normalized output of any child task, whether it backs a worker body
/// or a nested supervisor's monitor loop. Unifying both into one enum is
/// what lets the monitor loop fan in over heterogeneous children through a
/// single combinator (`futures::stream::FuturesUnordered`).
pub enum ChildExit {
    /// A worker body's future resolved.
    Worker(WorkerOutcome),
    /// A nested supervisor's monitor loop resolved. `Ok(())` is a clean
    /// exit (`SupervisorTerminated`, already emitted by the child itself);
    /// `Err` is a failure (`SupervisorFailed`, already emitted by the child
    /// itself, or still pending if the cause was a timeout observed by the
    /// parent).
    Supervisor(Result<(), SupervisorError>),
}

impl ChildExit {
    /// Whether this exit represents a failure for restart-decision
    /// purposes.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ChildExit::Worker(WorkerOutcome::Failed(_)) | ChildExit::Supervisor(Err(_))
        )
    }

    /// Whether this exit represents a cooperative cancellation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ChildExit::Worker(WorkerOutcome::Aborted))
    }

    /// Classifies this exit into the restart-policy decision table. A
    /// nested supervisor only reaches [`ChildExit::Supervisor`] inside the
    /// monitoring loop (as opposed to the termination path) when it fails
    /// spontaneously (e.g. its own restart-intensity budget was exceeded),
    /// so `Ok(())` here is treated defensively as a clean completion.
    pub fn exit_kind(&self) -> ExitKind {
        match self {
            ChildExit::Worker(outcome) => outcome.exit_kind(),
            ChildExit::Supervisor(Ok(())) => ExitKind::Completed,
            ChildExit::Supervisor(Err(_)) => ExitKind::Failed,
        }
    }
}
