//! Fluent builders for [`NodeSpec`](crate::spec::NodeSpec) trees, mirroring
//! the crate's existing `with_*` builder idiom.

// Layer 1: Standard library
use std::collections::HashSet;
use std::sync::Arc;

// Layer 2: Third-party crates
// (none beyond std for this module)

// Layer 3: Internal modules
use crate::error::SupervisorError;
use crate::event::EventNotifier;
use crate::spec::policy::{RestartIntensity, RestartPolicy, ShutdownPolicy, StartOrder, Strategy};
use crate::spec::worker::WorkerBody;
use crate::spec::{NodeSpec, SupervisorSpec, WorkerSpec};

fn validate_name(name: &str) -> Result<(), SupervisorError> {
    if name.is_empty() {
        return Err(SupervisorError::InvalidSpec {
            reason: "node name must not be empty".into(),
        });
    }
    if name.contains('/') {
        return Err(SupervisorError::InvalidSpec {
            reason: format!("node name '{name}' must not contain '/'"),
        });
    }
    Ok(())
}

/// Builds a leaf [`NodeSpec::Worker`].
///
/// Returns `Err` if `name` is empty or contains `/`; panicking on a bad
/// worker name would be surprising for a pure builder call, so the error is
/// surfaced the same way [`SupervisorSpecBuilder::build`] surfaces spec
/// errors.
pub fn worker_spec(
    name: impl Into<String>,
    body: WorkerBody,
) -> Result<NodeSpec, SupervisorError> {
    let name = name.into();
    validate_name(&name)?;
    Ok(NodeSpec::Worker(Arc::new(WorkerSpec {
        name,
        body,
        restart_policy: RestartPolicy::default(),
        shutdown_policy: ShutdownPolicy::default(),
        capture_signal: false,
    })))
}

/// Applies a restart policy to a previously-built worker [`NodeSpec`].
///
/// Consuming-builder style would require threading options through
/// [`worker_spec`] directly; this free function lets callers compose
/// `worker_spec(..)?.with_restart(RestartPolicy::Temporary)` instead, which
/// reads closer to the supervisor builder's own `with_*` options.
pub trait NodeSpecExt {
    /// Overrides this node's restart policy (used when it is a child).
    fn with_restart(self, policy: RestartPolicy) -> Self;
    /// Overrides this node's shutdown policy (used when it is a child).
    fn with_shutdown(self, policy: ShutdownPolicy) -> Self;
    /// Overrides whether this node additionally observes OS-signal-driven
    /// cancellation. Only meaningful for workers; a no-op on supervisors.
    fn with_capture_signal(self, capture: bool) -> Self;
}

impl NodeSpecExt for NodeSpec {
    fn with_restart(self, policy: RestartPolicy) -> Self {
        match self {
            NodeSpec::Worker(w) => {
                let mut spec = (*w).clone_spec();
                spec.restart_policy = policy;
                NodeSpec::Worker(Arc::new(spec))
            }
            NodeSpec::Supervisor(s) => {
                let mut spec = (*s).clone_spec();
                spec.restart_policy = policy;
                NodeSpec::Supervisor(Arc::new(spec))
            }
        }
    }

    fn with_shutdown(self, policy: ShutdownPolicy) -> Self {
        match self {
            NodeSpec::Worker(w) => {
                let mut spec = (*w).clone_spec();
                spec.shutdown_policy = policy;
                NodeSpec::Worker(Arc::new(spec))
            }
            NodeSpec::Supervisor(s) => {
                let mut spec = (*s).clone_spec();
                spec.shutdown_policy = policy;
                NodeSpec::Supervisor(Arc::new(spec))
            }
        }
    }

    fn with_capture_signal(self, capture: bool) -> Self {
        match self {
            NodeSpec::Worker(w) => {
                let mut spec = (*w).clone_spec();
                spec.capture_signal = capture;
                NodeSpec::Worker(Arc::new(spec))
            }
            other @ NodeSpec::Supervisor(_) => other,
        }
    }
}

impl WorkerSpec {
    fn clone_spec(&self) -> WorkerSpec {
        WorkerSpec {
            name: self.name.clone(),
            body: self.body.clone(),
            restart_policy: self.restart_policy,
            shutdown_policy: self.shutdown_policy,
            capture_signal: self.capture_signal,
        }
    }
}

impl SupervisorSpec {
    fn clone_spec(&self) -> SupervisorSpec {
        SupervisorSpec {
            name: self.name.clone(),
            children: self.children.iter().map(clone_node_spec).collect(),
            order: self.order,
            strategy: self.strategy,
            restart_intensity: self.restart_intensity,
            restart_policy: self.restart_policy,
            shutdown_policy: self.shutdown_policy,
            notifier: self.notifier.clone(),
        }
    }
}

fn clone_node_spec(node: &NodeSpec) -> NodeSpec {
    match node {
        NodeSpec::Worker(w) => NodeSpec::Worker(w.clone()),
        NodeSpec::Supervisor(s) => NodeSpec::Supervisor(s.clone()),
    }
}

/// Fluent builder for a [`SupervisorSpec`].
pub struct SupervisorSpecBuilder {
    name: String,
    children: Vec<NodeSpec>,
    order: StartOrder,
    strategy: Strategy,
    restart_intensity: RestartIntensity,
    restart_policy: RestartPolicy,
    shutdown_policy: ShutdownPolicy,
    notifier: Option<Arc<dyn EventNotifier>>,
}

impl SupervisorSpecBuilder {
    /// Starts building a supervisor spec named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            order: StartOrder::default(),
            strategy: Strategy::default(),
            restart_intensity: RestartIntensity::default(),
            restart_policy: RestartPolicy::default(),
            shutdown_policy: ShutdownPolicy::default(),
            notifier: None,
        }
    }

    /// Appends children (workers or subtrees) in declaration order.
    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.children.extend(children);
        self
    }

    /// Appends a single nested supervisor subtree.
    pub fn with_subtree(mut self, subtree: SupervisorSpec) -> Self {
        self.children.push(NodeSpec::Supervisor(Arc::new(subtree)));
        self
    }

    /// Sets the start-order direction.
    pub fn with_order(mut self, order: StartOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the restart strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the restart-intensity budget.
    pub fn with_restart_intensity(mut self, max_restarts: u32, window: std::time::Duration) -> Self {
        self.restart_intensity = RestartIntensity::new(max_restarts, window);
        self
    }

    /// Sets this supervisor's own restart policy (used when it is a child).
    pub fn with_restart(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Sets this supervisor's own shutdown policy (used when it is a
    /// child).
    pub fn with_shutdown(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
        self
    }

    /// Installs the event sink for the whole tree rooted here. Only
    /// meaningful on the root spec passed to [`crate::api::start`]; nested
    /// subtrees inherit the root's notifier rather than storing their own.
    pub fn with_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validates and builds the spec.
    ///
    /// Fails with [`SupervisorError::InvalidSpec`] when the name is empty or
    /// contains `/`, when `window <= 0` for the restart-intensity budget, or
    /// when two children share a name.
    pub fn build(self) -> Result<SupervisorSpec, SupervisorError> {
        validate_name(&self.name)?;

        if self.restart_intensity.window().is_zero() {
            return Err(SupervisorError::InvalidSpec {
                reason: "restart_intensity window must be greater than zero".into(),
            });
        }

        let mut seen = HashSet::with_capacity(self.children.len());
        for child in &self.children {
            if !seen.insert(child.name().to_string()) {
                return Err(SupervisorError::InvalidSpec {
                    reason: format!("duplicate child name '{}' under '{}'", child.name(), self.name),
                });
            }
        }

        Ok(SupervisorSpec {
            name: self.name,
            children: self.children,
            order: self.order,
            strategy: self.strategy,
            restart_intensity: self.restart_intensity,
            restart_policy: self.restart_policy,
            shutdown_policy: self.shutdown_policy,
            notifier: self.notifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::wait_for_cancellation;

    #[test]
    fn empty_name_is_rejected() {
        let err = SupervisorSpecBuilder::new("").build().unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidSpec { .. }));
    }

    #[test]
    fn slash_in_name_is_rejected() {
        let err = SupervisorSpecBuilder::new("root/child").build().unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidSpec { .. }));
    }

    #[test]
    fn zero_window_intensity_is_rejected() {
        let err = SupervisorSpecBuilder::new("root")
            .with_restart_intensity(1, std::time::Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidSpec { .. }));
    }

    #[test]
    fn duplicate_sibling_names_are_rejected() {
        let one = worker_spec("one", wait_for_cancellation()).unwrap();
        let other_one = worker_spec("one", wait_for_cancellation()).unwrap();
        let err = SupervisorSpecBuilder::new("root")
            .with_children([one, other_one])
            .build()
            .unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidSpec { .. }));
    }

    #[test]
    fn valid_spec_preserves_declared_children_order() {
        let a = worker_spec("a", wait_for_cancellation()).unwrap();
        let b = worker_spec("b", wait_for_cancellation()).unwrap();
        let spec = SupervisorSpecBuilder::new("root")
            .with_children([a, b])
            .build()
            .unwrap();
        let names: Vec<_> = spec.children().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn start_order_reverses_for_right_to_left() {
        let a = worker_spec("a", wait_for_cancellation()).unwrap();
        let b = worker_spec("b", wait_for_cancellation()).unwrap();
        let spec = SupervisorSpecBuilder::new("root")
            .with_children([a, b])
            .with_order(StartOrder::RightToLeft)
            .build()
            .unwrap();
        let names: Vec<_> = spec.start_order().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }
}
