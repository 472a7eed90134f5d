//! The node specification model: an immutable description of a worker or a
//! supervisor subtree.
//!
//! A [`NodeSpec`] is deep-immutable once built — the builder takes ownership
//! of every collection passed to it, so there is no caller-retained handle
//! whose later mutation could affect an already-built spec. Sibling names
//! are validated for uniqueness and path-safety at construction time, never
//! at start time.

// Module declarations
pub mod builder;
pub mod policy;
pub mod worker;

// Re-exports for convenient access
pub use builder::{worker_spec, NodeSpecExt, SupervisorSpecBuilder};
pub use policy::{ExitKind, RestartIntensity, RestartPolicy, ShutdownPolicy, StartOrder, Strategy};
pub use worker::{wait_for_cancellation, WorkerBody, WorkerContext, WorkerFuture, WorkerOutcome};

// Layer 1: Standard library
use std::sync::Arc;

/// An immutable tree node: either a worker or a nested supervisor subtree.
///
/// The subtree variant is what the specification calls the "subtree
/// adapter" — it lets a [`SupervisorSpec`] appear anywhere a [`NodeSpec`] is
/// expected, which is the sole mechanism by which supervisors nest.
#[derive(Clone)]
pub enum NodeSpec {
    /// A leaf worker.
    Worker(Arc<WorkerSpec>),
    /// A nested supervisor subtree.
    Supervisor(Arc<SupervisorSpec>),
}

impl NodeSpec {
    /// The node's own name (not its full path).
    pub fn name(&self) -> &str {
        match self {
            NodeSpec::Worker(w) => &w.name,
            NodeSpec::Supervisor(s) => &s.name,
        }
    }

    /// This node's restart policy when it is a child of some supervisor.
    pub fn restart_policy(&self) -> RestartPolicy {
        match self {
            NodeSpec::Worker(w) => w.restart_policy,
            NodeSpec::Supervisor(s) => s.restart_policy,
        }
    }

    /// This node's shutdown policy when it is a child of some supervisor.
    pub fn shutdown_policy(&self) -> ShutdownPolicy {
        match self {
            NodeSpec::Worker(w) => w.shutdown_policy,
            NodeSpec::Supervisor(s) => s.shutdown_policy,
        }
    }
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeSpec::Worker(w) => f.debug_tuple("Worker").field(&w.name).finish(),
            NodeSpec::Supervisor(s) => f.debug_tuple("Supervisor").field(&s.name).finish(),
        }
    }
}

/// An immutable description of a single worker: its body and the policies
/// governing its restart and shutdown.
pub struct WorkerSpec {
    pub(crate) name: String,
    pub(crate) body: WorkerBody,
    pub(crate) restart_policy: RestartPolicy,
    pub(crate) shutdown_policy: ShutdownPolicy,
    /// Whether this worker additionally observes OS-signal-driven
    /// cancellation through its token, on top of the tokio cancellation
    /// every worker always receives. Retained from the distilled spec's
    /// `capture_signal` field; this crate's cancellation is always
    /// propagated through a `CancellationToken` regardless of this flag.
    pub(crate) capture_signal: bool,
}

impl WorkerSpec {
    /// The worker's own name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The worker's restart policy.
    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    /// The worker's shutdown policy.
    pub fn shutdown_policy(&self) -> ShutdownPolicy {
        self.shutdown_policy
    }

    /// Whether OS-signal propagation is requested for this worker.
    pub fn capture_signal(&self) -> bool {
        self.capture_signal
    }
}

/// An immutable description of a supervisor and its children.
pub struct SupervisorSpec {
    pub(crate) name: String,
    pub(crate) children: Vec<NodeSpec>,
    pub(crate) order: StartOrder,
    pub(crate) strategy: Strategy,
    pub(crate) restart_intensity: RestartIntensity,
    pub(crate) restart_policy: RestartPolicy,
    pub(crate) shutdown_policy: ShutdownPolicy,
    pub(crate) notifier: Option<Arc<dyn crate::event::EventNotifier>>,
}

impl std::fmt::Debug for SupervisorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorSpec")
            .field("name", &self.name)
            .field("children", &self.children)
            .field("order", &self.order)
            .field("strategy", &self.strategy)
            .field("restart_intensity", &self.restart_intensity)
            .field("restart_policy", &self.restart_policy)
            .field("shutdown_policy", &self.shutdown_policy)
            .finish_non_exhaustive()
    }
}

impl SupervisorSpec {
    /// The supervisor's own name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared children, in declaration order (not start order).
    pub fn children(&self) -> &[NodeSpec] {
        &self.children
    }

    /// The configured start-order direction.
    pub fn order(&self) -> StartOrder {
        self.order
    }

    /// The configured restart strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The configured restart-intensity budget.
    pub fn restart_intensity(&self) -> RestartIntensity {
        self.restart_intensity
    }

    /// This supervisor's restart policy when it is itself a child.
    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    /// This supervisor's shutdown policy when it is itself a child.
    pub fn shutdown_policy(&self) -> ShutdownPolicy {
        self.shutdown_policy
    }

    /// The children in the order they are actually started, honoring
    /// `order`.
    pub fn start_order(&self) -> Vec<&NodeSpec> {
        match self.order {
            StartOrder::LeftToRight => self.children.iter().collect(),
            StartOrder::RightToLeft => self.children.iter().rev().collect(),
        }
    }

    /// The notifier installed on this (root) spec, if any.
    pub fn notifier(&self) -> Option<Arc<dyn crate::event::EventNotifier>> {
        self.notifier.clone()
    }
}
