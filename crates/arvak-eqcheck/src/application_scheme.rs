//! Application schemes (spec §4.C): given two task managers' progress,
//! decide how many operations to advance from each per step.

use arvak_dd::{Edge, Package};

use crate::config::{ApplicationSchemeKind, GateCostProfile};
use crate::task_manager::TaskManager;

/// How many operations to advance from circuit 1 and circuit 2 this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// Operations to advance from the first task.
    pub k1: usize,
    /// Operations to advance from the second task.
    pub k2: usize,
}

/// A cost function mapping `(gate name, n_controls)` to an integer cost, the
/// `CostFunction` trait object spec §4.C's `GateCost(function)` variant calls
/// for (a file-loaded [`GateCostProfile`] implements the same contract).
pub trait CostFunction: Send + Sync {
    /// The cost of applying a gate with the given name and control count.
    fn cost(&self, gate: &str, n_controls: u32) -> u32;
}

impl CostFunction for GateCostProfile {
    fn cost(&self, gate: &str, n_controls: u32) -> u32 {
        self.cost(gate, n_controls, 1)
    }
}

/// Picks how many gates to advance from each of two task managers per step.
///
/// `Lookahead` is the only variant that manipulates DD state itself (it must
/// provisionally multiply both candidate gates to compare resulting DD
/// sizes), so it takes `pkg`/`state` and returns the already-advanced state
/// alongside an always-`(0, 0)` `Advance` (matching spec §4.C: "returns
/// `(0,0)` because it manipulates state itself").
pub enum ApplicationScheme {
    /// `(|circ1|, |circ2|)` once.
    Sequential,
    /// `(1, 1)`.
    OneToOne,
    /// `(r, 1)` or `(1, r)` by gate-count ratio.
    Proportional,
    /// Cost-driven: `(1, cost(op1))`.
    GateCost(Box<dyn CostFunction>),
    /// Provisional dual-multiply, smaller-DD-wins (matrices only).
    Lookahead,
}

impl ApplicationScheme {
    /// Build a scheme from its configuration-level description.
    pub fn from_kind(kind: &ApplicationSchemeKind, default_cost: u32) -> Self {
        match kind {
            ApplicationSchemeKind::Sequential => Self::Sequential,
            ApplicationSchemeKind::OneToOne => Self::OneToOne,
            ApplicationSchemeKind::Proportional => Self::Proportional,
            ApplicationSchemeKind::GateCost { profile } => {
                let profile = profile
                    .as_ref()
                    .and_then(|p| GateCostProfile::from_file(p).ok())
                    .unwrap_or_default();
                let _ = default_cost;
                Self::GateCost(Box::new(profile))
            }
            ApplicationSchemeKind::Lookahead => Self::Lookahead,
        }
    }

    /// How many ops to advance this step, given both tasks' remaining counts.
    pub fn next(&self, t1: &TaskManager, t2: &TaskManager) -> Advance {
        let (r1, r2) = (t1.remaining(), t2.remaining());
        match self {
            Self::Sequential => Advance { k1: r1, k2: r2 },
            Self::OneToOne => Advance {
                k1: r1.min(1),
                k2: r2.min(1),
            },
            Self::Proportional => {
                if r1 == 0 || r2 == 0 {
                    return Advance { k1: r1, k2: r2 };
                }
                if r1 >= r2 {
                    let r = (r1 as f64 / r2 as f64).round().max(1.0) as usize;
                    Advance { k1: r.min(r1), k2: 1 }
                } else {
                    let r = (r2 as f64 / r1 as f64).round().max(1.0) as usize;
                    Advance { k1: 1, k2: r.min(r2) }
                }
            }
            Self::GateCost(cost_fn) => {
                let Some(op1) = t1.peek() else {
                    return Advance { k1: 0, k2: r2.min(1) };
                };
                let n_controls = op1.control_qubits().len() as u32;
                let cost = cost_fn.cost(op1.name(), n_controls).max(1) as usize;
                Advance {
                    k1: r1.min(1),
                    k2: cost.min(r2.max(cost)),
                }
            }
            Self::Lookahead => Advance { k1: 0, k2: 0 },
        }
    }

    /// Lookahead's own advancement, provisionally multiplying each
    /// candidate op into `state` and keeping whichever yields the smaller
    /// resulting DD (approximated here by node count rather than a full
    /// traversal, since the package does not expose subgraph size queries
    /// beyond its own node arena).
    pub fn lookahead_step(
        &self,
        pkg: &mut Package,
        t1: &mut TaskManager,
        t2: &mut TaskManager,
        state: Edge,
    ) -> Edge {
        debug_assert!(matches!(self, Self::Lookahead));
        if t1.finished() {
            return t2.advance(pkg, state, 1).unwrap_or(state);
        }
        if t2.finished() {
            return t1.advance(pkg, state, 1).unwrap_or(state);
        }
        let before = pkg.node_count();
        let mut t1_trial = t1.clone();
        let candidate1 = t1_trial.advance(pkg, state, 1).unwrap_or(state);
        let after1 = pkg.node_count();
        let mut t2_trial = t2.clone();
        let candidate2 = t2_trial.advance(pkg, state, 1).unwrap_or(state);
        let after2 = pkg.node_count();
        if after1.saturating_sub(before) <= after2.saturating_sub(before) {
            *t1 = t1_trial;
            candidate1
        } else {
            *t2 = t2_trial;
            candidate2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arvak_dd::Direction;
    use arvak_ir::Circuit;

    #[test]
    fn test_proportional_scales_with_remaining_ratio() {
        let c1 = Circuit::ghz(4).unwrap();
        let c2 = Circuit::ghz(2).unwrap();
        let t1 = TaskManager::new(&c1, Direction::Left);
        let t2 = TaskManager::new(&c2, Direction::Right);
        let scheme = ApplicationScheme::Proportional;
        let adv = scheme.next(&t1, &t2);
        assert!(adv.k1 >= 1 && adv.k2 >= 1);
    }

    #[test]
    fn test_one_to_one_always_advances_by_one() {
        let c1 = Circuit::bell().unwrap();
        let c2 = Circuit::bell().unwrap();
        let t1 = TaskManager::new(&c1, Direction::Left);
        let t2 = TaskManager::new(&c2, Direction::Right);
        let adv = ApplicationScheme::OneToOne.next(&t1, &t2);
        assert_eq!(adv, Advance { k1: 1, k2: 1 });
    }
}
