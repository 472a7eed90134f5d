//! Computes which siblings a restart strategy affects, given the child that
//! actually failed and the supervisor's static start order.
//!
//! Expressed as a pure function over the start-order list rather than the
//! teacher's compile-time-generic `SupervisionStrategy` trait, since the
//! strategy here must be selected dynamically per supervisor instance via
//! `with_strategy`, not fixed at the type level.

// Layer 3: Internal modules
use crate::runtime::ChildId;
use crate::spec::Strategy;

/// Returns the children that must be restarted together, in start order,
/// given that `failed` just exited.
///
/// - `OneForOne`: only `failed`.
/// - `OneForAll`: every child, in start order (the caller terminates every
///   *other* child in reverse order first; `failed` is already gone).
/// - `RestForOne`: `failed` and every child started after it, in start
///   order.
pub fn affected_children(strategy: Strategy, failed: &ChildId, order: &[ChildId]) -> Vec<ChildId> {
    match strategy {
        Strategy::OneForOne => vec![failed.clone()],
        Strategy::OneForAll => order.to_vec(),
        Strategy::RestForOne => match order.iter().position(|id| id == failed) {
            Some(idx) => order[idx..].to_vec(),
            None => vec![failed.clone()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ChildId> {
        names.iter().map(|n| ChildId::from(*n)).collect()
    }

    #[test]
    fn one_for_one_restarts_only_the_failed_child() {
        let order = ids(&["a", "b", "c"]);
        let affected = affected_children(Strategy::OneForOne, &ChildId::from("b"), &order);
        assert_eq!(affected, ids(&["b"]));
    }

    #[test]
    fn one_for_all_restarts_every_child_in_start_order() {
        let order = ids(&["a", "b", "c"]);
        let affected = affected_children(Strategy::OneForAll, &ChildId::from("b"), &order);
        assert_eq!(affected, ids(&["a", "b", "c"]));
    }

    #[test]
    fn rest_for_one_restarts_failed_and_successors_only() {
        let order = ids(&["a", "b", "c", "d"]);
        let affected = affected_children(Strategy::RestForOne, &ChildId::from("b"), &order);
        assert_eq!(affected, ids(&["b", "c", "d"]));
    }
}
