//! The four equivalence checkers (spec §4.D-G).
//!
//! Each checker exclusively owns a [`arvak_dd::Package`] (they never share
//! one — this is what lets the manager run them on separate threads safely)
//! and reports an [`crate::criterion::EquivalenceCriterion`] from `run()`.

pub mod alternating;
pub mod construction;
pub mod simulation;
pub mod zx;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::criterion::EquivalenceCriterion;

/// A verdict plus the JSON-serializable detail the manager aggregates into
/// `Results` (spec §4.H: "Result aggregation... per-checker JSON").
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckerReport {
    /// Name of the checker that produced this report.
    pub checker: &'static str,
    /// The verdict reached.
    pub criterion: EquivalenceCriterion,
    /// Checker-specific detail (e.g. simulation run count, ZX rewrite rounds).
    pub detail: serde_json::Value,
}

/// Narrow contract every checker implements, matching the `{run, signal_done,
/// emit_json}` shape spec.md §9 recommends in place of a base-class
/// hierarchy.
pub trait Checker {
    /// Human-readable checker name, used in reports and logs.
    fn name(&self) -> &'static str;

    /// Run to completion or until `done` is observed set; returns the best
    /// verdict reached.
    fn run(&mut self, done: &AtomicBool) -> CheckerReport;
}

/// Convenience: whether cooperative cancellation has been requested.
pub fn is_done(done: &AtomicBool) -> bool {
    done.load(Ordering::Acquire)
}

/// Compare two (already ancillae/garbage-reduced, permutation-aligned)
/// matrix DDs, per spec §4.D's `equals` routine: pointer+weight equality
/// under `eps` is `Equivalent`; matching pointer with differing weight is
/// `EquivalentUpToGlobalPhase`; otherwise fall back to a trace check on
/// `state1 * state2^dagger`.
pub fn equals(
    pkg: &mut arvak_dd::Package,
    state1: arvak_dd::Edge,
    state2: arvak_dd::Edge,
    trace_threshold: f64,
) -> EquivalenceCriterion {
    if state1.node == state2.node {
        if (state1.weight - state2.weight).norm() <= pkg.eps() {
            return EquivalenceCriterion::Equivalent;
        }
        return EquivalenceCriterion::EquivalentUpToGlobalPhase;
    }
    let dagger2 = pkg.conjugate_transpose(state2);
    let product = pkg.multiply(state1, dagger2);
    if pkg.is_close_to_identity(product, trace_threshold) {
        EquivalenceCriterion::Equivalent
    } else {
        EquivalenceCriterion::NotEquivalent
    }
}
