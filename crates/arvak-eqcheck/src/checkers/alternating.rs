//! Alternating checker (spec §4.E): apply circuit 1 from the left and
//! circuit 2 inverted from the right onto a single matrix DD `F`, seeded at
//! the ancillae-reduced identity, striving to reduce `F` back to identity.

use std::sync::atomic::AtomicBool;

use arvak_dd::{Direction, Package};
use arvak_ir::Circuit;

use crate::application_scheme::ApplicationScheme;
use crate::checkers::{equals, is_done, Checker, CheckerReport};
use crate::config::{ApplicationSchemeKind, Configuration};
use crate::criterion::EquivalenceCriterion;
use crate::task_manager::{heads_match, TaskManager};

/// Interleaves forward/inverse application to keep `F` close to identity
/// throughout, usually terminating well before both circuits are consumed.
pub struct AlternatingChecker {
    pkg: Package,
    t1: TaskManager,
    t2: TaskManager,
    n_qubits: u32,
    trace_threshold: f64,
    scheme: ApplicationScheme,
    is_lookahead: bool,
}

impl AlternatingChecker {
    /// Whether this pair of circuits is eligible for the Alternating
    /// approach (spec §4.E `can_handle`): ineligible when the two circuits'
    /// ancillary-qubit masks disagree, in which case the manager falls back
    /// to the Construction checker.
    pub fn can_handle(c1: &Circuit, c2: &Circuit) -> bool {
        c1.ancillary().len() == c2.ancillary().len()
            && c1
                .ancillary()
                .iter()
                .zip(c2.ancillary())
                .all(|(a, b)| a == b)
    }

    /// Build a checker for an eligible pair. Panics if `Lookahead` is paired
    /// with a scheme mismatch the manager should have already rejected via
    /// `UsageError` (Lookahead is matrix-only, which the alternating checker
    /// always is, so no additional validation is needed here).
    pub fn new(c1: &Circuit, c2: &Circuit, config: &Configuration) -> Self {
        let n_qubits = c1.num_qubits() as u32;
        let is_lookahead = matches!(
            config.application.alternating_scheme,
            ApplicationSchemeKind::Lookahead
        );
        let scheme = ApplicationScheme::from_kind(
            &config.application.alternating_scheme,
            config.application.default_gate_cost,
        );
        Self {
            pkg: Package::new(config.numerical_tolerance),
            t1: TaskManager::new(c1, Direction::Left),
            t2: TaskManager::new(c2, Direction::Right),
            n_qubits,
            trace_threshold: config.trace_threshold,
            scheme,
            is_lookahead,
        }
    }
}

impl Checker for AlternatingChecker {
    fn name(&self) -> &'static str {
        "alternating"
    }

    fn run(&mut self, done: &AtomicBool) -> CheckerReport {
        let ident = self.pkg.make_ident(self.n_qubits);
        let mut f = self.t1.reduce_ancillae(&mut self.pkg, ident);
        f = self.t2.reduce_ancillae(&mut self.pkg, f);
        self.pkg.inc_ref(f);

        let mut steps = 0usize;
        while !self.t1.finished() && !self.t2.finished() {
            if is_done(done) {
                return CheckerReport {
                    checker: self.name(),
                    criterion: EquivalenceCriterion::NoInformation,
                    detail: serde_json::json!({"reason": "cancelled", "steps": steps}),
                };
            }
            self.t1.apply_swap_operations();
            self.t2.apply_swap_operations();
            if self.t1.finished() || self.t2.finished() {
                break;
            }

            if !self.is_lookahead
                && self.pkg.is_close_to_identity(f, self.trace_threshold)
                && heads_match(&self.t1, &self.t2)
            {
                // Matched pair: circuit 2's op is circuit 1's op inverse-applied
                // from the right, so skipping both leaves `F` at identity.
                let new_f1 = self.t1.advance(&mut self.pkg, f, 1).unwrap_or(f);
                let new_f = self.t2.advance(&mut self.pkg, new_f1, 1).unwrap_or(new_f1);
                self.pkg.inc_ref(new_f);
                self.pkg.dec_ref(f);
                f = new_f;
                steps += 1;
                continue;
            }

            if self.is_lookahead {
                let new_f = self.scheme.lookahead_step(&mut self.pkg, &mut self.t1, &mut self.t2, f);
                self.pkg.inc_ref(new_f);
                self.pkg.dec_ref(f);
                f = new_f;
            } else {
                let adv = self.scheme.next(&self.t1, &self.t2);
                let mut new_f = f;
                if adv.k1 > 0 {
                    new_f = self.t1.advance(&mut self.pkg, new_f, adv.k1).unwrap_or(new_f);
                }
                if adv.k2 > 0 {
                    new_f = self.t2.advance(&mut self.pkg, new_f, adv.k2).unwrap_or(new_f);
                }
                if adv.k1 == 0 && adv.k2 == 0 {
                    break;
                }
                self.pkg.inc_ref(new_f);
                self.pkg.dec_ref(f);
                f = new_f;
            }
            steps += 1;
        }

        // Drain whichever side still has operations left.
        while !self.t1.finished() {
            if is_done(done) {
                break;
            }
            let new_f = self.t1.advance(&mut self.pkg, f, 1).unwrap_or(f);
            self.pkg.inc_ref(new_f);
            self.pkg.dec_ref(f);
            f = new_f;
        }
        while !self.t2.finished() {
            if is_done(done) {
                break;
            }
            let new_f = self.t2.advance(&mut self.pkg, f, 1).unwrap_or(f);
            self.pkg.inc_ref(new_f);
            self.pkg.dec_ref(f);
            f = new_f;
        }

        f = self.t1.change_permutation(&mut self.pkg, f);
        f = self.t2.reduce_garbage(&mut self.pkg, f, false);
        f = self.t1.reduce_ancillae(&mut self.pkg, f);
        f = self.t2.reduce_ancillae(&mut self.pkg, f);

        let ident_final = self.pkg.make_ident(self.n_qubits);
        let criterion = equals(&mut self.pkg, f, ident_final, self.trace_threshold);
        CheckerReport {
            checker: self.name(),
            criterion,
            detail: serde_json::json!({"steps": steps, "nodes_allocated": self.pkg.node_count()}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_pair_equals_itself() {
        let c1 = Circuit::bell().unwrap();
        let c2 = Circuit::bell().unwrap();
        assert!(AlternatingChecker::can_handle(&c1, &c2));
        let config = Configuration::default();
        let mut checker = AlternatingChecker::new(&c1, &c2, &config);
        let done = AtomicBool::new(false);
        let report = checker.run(&done);
        assert_eq!(report.criterion, EquivalenceCriterion::Equivalent);
    }

    #[test]
    fn test_bell_pair_with_global_phase() {
        use arvak_ir::QubitId;
        let c1 = Circuit::bell().unwrap();
        let mut c2 = Circuit::bell().unwrap();
        // Z X Z X on q0 is a global phase of -1.
        c2.z(QubitId(0)).unwrap();
        c2.x(QubitId(0)).unwrap();
        c2.z(QubitId(0)).unwrap();
        c2.x(QubitId(0)).unwrap();

        let config = Configuration::default();
        let mut checker = AlternatingChecker::new(&c1, &c2, &config);
        let done = AtomicBool::new(false);
        let report = checker.run(&done);
        assert!(report.criterion.is_equivalent());
    }
}
