//! Construction checker (spec §4.D): build each circuit's full matrix DD
//! independently and compare. The safety-net checker when ancillae/garbage
//! complicate the Alternating approach.

use std::sync::atomic::AtomicBool;

use arvak_dd::{Direction, Package};
use arvak_ir::Circuit;

use crate::application_scheme::ApplicationScheme;
use crate::checkers::{equals, is_done, Checker, CheckerReport};
use crate::config::Configuration;
use crate::task_manager::TaskManager;

/// Independently constructs and compares the two circuits' unitaries.
pub struct ConstructionChecker {
    pkg: Package,
    t1: TaskManager,
    t2: TaskManager,
    n_qubits: u32,
    trace_threshold: f64,
    check_partial_equivalence: bool,
    scheme: ApplicationScheme,
}

impl ConstructionChecker {
    /// Build a checker for the preprocessed pair `(c1, c2)`, which must
    /// already have equal qubit counts (spec invariant I4).
    pub fn new(c1: &Circuit, c2: &Circuit, config: &Configuration) -> Self {
        let n_qubits = c1.num_qubits() as u32;
        let scheme = ApplicationScheme::from_kind(
            &config.application.construction_scheme,
            config.application.default_gate_cost,
        );
        Self {
            pkg: Package::new(config.numerical_tolerance),
            t1: TaskManager::new(c1, Direction::Left),
            t2: TaskManager::new(c2, Direction::Left),
            n_qubits,
            trace_threshold: config.trace_threshold,
            check_partial_equivalence: config.check_partial_equivalence,
            scheme,
        }
    }
}

impl Checker for ConstructionChecker {
    fn name(&self) -> &'static str {
        "construction"
    }

    fn run(&mut self, done: &AtomicBool) -> CheckerReport {
        let ident = self.pkg.make_ident(self.n_qubits);
        let mut s1 = self.t1.reduce_ancillae(&mut self.pkg, ident);
        let mut s2 = self.t2.reduce_ancillae(&mut self.pkg, ident);
        self.pkg.inc_ref(s1);
        self.pkg.inc_ref(s2);

        while !self.t1.finished() || !self.t2.finished() {
            if is_done(done) {
                return CheckerReport {
                    checker: self.name(),
                    criterion: crate::criterion::EquivalenceCriterion::NoInformation,
                    detail: serde_json::json!({"reason": "cancelled"}),
                };
            }
            self.t1.apply_swap_operations();
            self.t2.apply_swap_operations();
            let adv = self.scheme.next(&self.t1, &self.t2);
            if adv.k1 > 0 {
                let new_s1 = self.t1.advance(&mut self.pkg, s1, adv.k1).unwrap_or(s1);
                self.pkg.inc_ref(new_s1);
                self.pkg.dec_ref(s1);
                s1 = new_s1;
            }
            if adv.k2 > 0 {
                let new_s2 = self.t2.advance(&mut self.pkg, s2, adv.k2).unwrap_or(s2);
                self.pkg.inc_ref(new_s2);
                self.pkg.dec_ref(s2);
                s2 = new_s2;
            }
            if adv.k1 == 0 && adv.k2 == 0 {
                break;
            }
        }

        s1 = self.t1.change_permutation(&mut self.pkg, s1);
        s1 = self.t1.reduce_ancillae(&mut self.pkg, s1);
        s2 = self.t2.change_permutation(&mut self.pkg, s2);
        s2 = self.t2.reduce_ancillae(&mut self.pkg, s2);
        if self.check_partial_equivalence {
            s1 = self.t1.reduce_garbage(&mut self.pkg, s1, true);
            s2 = self.t2.reduce_garbage(&mut self.pkg, s2, true);
        }

        let criterion = equals(&mut self.pkg, s1, s2, self.trace_threshold);
        CheckerReport {
            checker: self.name(),
            criterion,
            detail: serde_json::json!({"nodes_allocated": self.pkg.node_count()}),
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
        let config = Configuration::default();
        let mut checker = ConstructionChecker::new(&c1, &c2, &config);
        let done = AtomicBool::new(false);
        let report = checker.run(&done);
        assert_eq!(
            report.criterion,
            crate::criterion::EquivalenceCriterion::Equivalent
        );
    }

    #[test]
    fn test_cnot_direction_reversal_is_equivalent() {
        use arvak_ir::QubitId;
        let mut c1 = Circuit::with_size("c1", 2, 0);
        c1.cx(QubitId(0), QubitId(1)).unwrap();

        let mut c2 = Circuit::with_size("c2", 2, 0);
        c2.h(QubitId(0)).unwrap();
        c2.h(QubitId(1)).unwrap();
        c2.cx(QubitId(1), QubitId(0)).unwrap();
        c2.h(QubitId(0)).unwrap();
        c2.h(QubitId(1)).unwrap();

        let config = Configuration::default();
        let mut checker = ConstructionChecker::new(&c1, &c2, &config);
        let done = AtomicBool::new(false);
        let report = checker.run(&done);
        assert_eq!(
            report.criterion,
            crate::criterion::EquivalenceCriterion::Equivalent
        );
    }
}
