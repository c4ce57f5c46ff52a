//! Simulation checker (spec §4.F): sample initial states, forward-simulate
//! through both circuits, compare resulting state vectors by fidelity.

use std::sync::atomic::AtomicBool;

use arvak_dd::{Direction, Edge, Package};
use arvak_ir::{Circuit, Instruction, QubitId, StandardGate};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;

use crate::checkers::{is_done, Checker, CheckerReport};
use crate::config::{Configuration, StateType};
use crate::criterion::EquivalenceCriterion;
use crate::gate_lowering::lower_gate;
use crate::task_manager::TaskManager;

const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Samples initial states for the simulation checker (spec §4.F variants).
pub struct StateGenerator {
    kind: StateType,
    rng: StdRng,
    used_basis_states: FxHashSet<u64>,
}

impl StateGenerator {
    /// Build a generator; `seed == 0` selects a nondeterministic seed.
    pub fn new(kind: StateType, seed: u64) -> Self {
        let rng = if seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(seed)
        };
        Self {
            kind,
            rng,
            used_basis_states: FxHashSet::default(),
        }
    }

    /// Sample one initial state DD over `n_qubits`, forcing ancillary qubits
    /// to |0>. Returns `None` when `ComputationalBasis` has exhausted every
    /// basis state (`2^n_data`).
    pub fn sample(&mut self, pkg: &mut Package, n_qubits: u32, ancillary: &[bool]) -> Option<Edge> {
        let n_data = ancillary.iter().filter(|&&a| !a).count() as u32;
        match self.kind {
            StateType::ComputationalBasis => {
                if n_data < 64 && self.used_basis_states.len() as u64 >= (1u64 << n_data) {
                    return None;
                }
                let mut bits = vec![false; n_qubits as usize];
                let data_idx: Vec<usize> = (0..n_qubits as usize)
                    .filter(|&i| !ancillary.get(i).copied().unwrap_or(false))
                    .collect();
                loop {
                    let mut key = 0u64;
                    for (i, &qi) in data_idx.iter().enumerate() {
                        let b = self.rng.gen_bool(0.5);
                        bits[qi] = b;
                        if b {
                            key |= 1 << i;
                        }
                    }
                    if self.used_basis_states.insert(key) || n_data >= 64 {
                        break;
                    }
                }
                Some(pkg.make_basis_state_bits(n_qubits, &bits))
            }
            StateType::Random1QBasis => {
                let per_qubit: Vec<[Complex64; 2]> = (0..n_qubits)
                    .map(|q| {
                        if ancillary.get(q as usize).copied().unwrap_or(false) {
                            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)]
                        } else {
                            self.random_1q_basis()
                        }
                    })
                    .collect();
                Some(pkg.make_basis_state_amplitudes(n_qubits, &per_qubit))
            }
            StateType::Stabilizer => Some(self.random_stabilizer_state(pkg, n_qubits, ancillary)),
        }
    }

    fn random_1q_basis(&mut self) -> [Complex64; 2] {
        let s = FRAC_1_SQRT_2;
        match self.rng.gen_range(0..6) {
            0 => [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)], // |0>
            1 => [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)], // |1>
            2 => [Complex64::new(s, 0.0), Complex64::new(s, 0.0)],     // |+>
            3 => [Complex64::new(s, 0.0), Complex64::new(-s, 0.0)],    // |->
            4 => [Complex64::new(s, 0.0), Complex64::new(0.0, -s)],    // |L>
            _ => [Complex64::new(s, 0.0), Complex64::new(0.0, s)],     // |R>
        }
    }

    fn random_stabilizer_state(&mut self, pkg: &mut Package, n_qubits: u32, ancillary: &[bool]) -> Edge {
        let mut state = pkg.make_zero_state(n_qubits);
        pkg.inc_ref(state);
        if n_qubits == 0 {
            return state;
        }
        let depth = (n_qubits as f64).log2().ceil().max(1.0) as usize;
        let data_qubits: Vec<u32> = (0..n_qubits)
            .filter(|&q| !ancillary.get(q as usize).copied().unwrap_or(false))
            .collect();
        if data_qubits.is_empty() {
            return state;
        }
        for _ in 0..depth {
            let choice = self.rng.gen_range(0..3);
            let inst = match choice {
                0 => {
                    let q = data_qubits[self.rng.gen_range(0..data_qubits.len())];
                    Instruction::single_qubit_gate(StandardGate::H, QubitId(q))
                }
                1 => {
                    let q = data_qubits[self.rng.gen_range(0..data_qubits.len())];
                    Instruction::single_qubit_gate(StandardGate::S, QubitId(q))
                }
                _ => {
                    if data_qubits.len() < 2 {
                        let q = data_qubits[0];
                        Instruction::single_qubit_gate(StandardGate::H, QubitId(q))
                    } else {
                        let i = self.rng.gen_range(0..data_qubits.len());
                        let mut j = self.rng.gen_range(0..data_qubits.len());
                        while j == i {
                            j = self.rng.gen_range(0..data_qubits.len());
                        }
                        Instruction::two_qubit_gate(StandardGate::CX, QubitId(data_qubits[i]), QubitId(data_qubits[j]))
                    }
                }
            };
            let gate = lower_gate(pkg, n_qubits, &inst).expect("stabilizer gates always lower");
            let new_state = pkg.multiply(gate, state);
            pkg.inc_ref(new_state);
            pkg.dec_ref(state);
            state = new_state;
        }
        state
    }
}

/// Samples initial states, forward-simulates both circuits, and compares by
/// fidelity, looping until non-equivalence is demonstrated, `max_sims` runs
/// all agree, or cancellation.
pub struct SimulationChecker {
    pkg: Package,
    c1: Circuit,
    c2: Circuit,
    generator: StateGenerator,
    fidelity_threshold: f64,
    max_sims: usize,
    store_cex_input: bool,
    store_cex_output: bool,
}

impl SimulationChecker {
    /// Build a checker for the preprocessed pair, given a shared `generator`
    /// (the source protects this with a mutex across simulation threads;
    /// here each checker owns its own since it owns its own package too).
    pub fn new(c1: &Circuit, c2: &Circuit, config: &Configuration) -> Self {
        Self {
            pkg: Package::new(config.numerical_tolerance),
            c1: c1.clone(),
            c2: c2.clone(),
            generator: StateGenerator::new(config.state_type, config.seed),
            fidelity_threshold: config.fidelity_threshold,
            max_sims: config.max_sims,
            store_cex_input: config.store_cex_input,
            store_cex_output: config.store_cex_output,
        }
    }

    fn one_run(&mut self) -> (EquivalenceCriterion, Option<Vec<Complex64>>, Option<(Vec<Complex64>, Vec<Complex64>)>) {
        let n = self.c1.num_qubits() as u32;
        let Some(psi) = self.generator.sample(&mut self.pkg, n, self.c1.ancillary()) else {
            return (EquivalenceCriterion::NoInformation, None, None);
        };
        self.pkg.inc_ref(psi);

        let mut t1 = TaskManager::new(&self.c1, Direction::Left);
        let mut t2 = TaskManager::new(&self.c2, Direction::Left);
        let mut s1 = psi;
        let mut s2 = psi;
        self.pkg.inc_ref(s1);
        self.pkg.inc_ref(s2);
        while !t1.finished() {
            s1 = t1.advance(&mut self.pkg, s1, 1).unwrap_or(s1);
        }
        while !t2.finished() {
            s2 = t2.advance(&mut self.pkg, s2, 1).unwrap_or(s2);
        }
        s1 = t1.reduce_ancillae(&mut self.pkg, s1);
        s2 = t2.reduce_ancillae(&mut self.pkg, s2);

        let inner = self.pkg.inner_product(s1, s2);
        let fidelity = self.pkg.fidelity(s1, s2);
        let verdict = if 1.0 - inner.re < self.fidelity_threshold {
            EquivalenceCriterion::Equivalent
        } else if (1.0 - fidelity).abs() < self.fidelity_threshold {
            EquivalenceCriterion::EquivalentUpToPhase
        } else {
            EquivalenceCriterion::NotEquivalent
        };

        let input_cex = if verdict == EquivalenceCriterion::NotEquivalent && self.store_cex_input {
            Some(self.pkg.get_vector(psi))
        } else {
            None
        };
        let output_cex = if verdict == EquivalenceCriterion::NotEquivalent && self.store_cex_output {
            Some((self.pkg.get_vector(s1), self.pkg.get_vector(s2)))
        } else {
            None
        };
        (verdict, input_cex, output_cex)
    }
}

impl Checker for SimulationChecker {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn run(&mut self, done: &AtomicBool) -> CheckerReport {
        if self.max_sims == 0 {
            return CheckerReport {
                checker: self.name(),
                criterion: EquivalenceCriterion::NoInformation,
                detail: serde_json::json!({"reason": "max_sims == 0"}),
            };
        }
        let mut runs = 0usize;
        while runs < self.max_sims {
            if is_done(done) {
                return CheckerReport {
                    checker: self.name(),
                    criterion: EquivalenceCriterion::NoInformation,
                    detail: serde_json::json!({"reason": "cancelled", "runs": runs}),
                };
            }
            let (verdict, input_cex, output_cex) = self.one_run();
            runs += 1;
            if verdict == EquivalenceCriterion::NotEquivalent {
                return CheckerReport {
                    checker: self.name(),
                    criterion: verdict,
                    detail: serde_json::json!({
                        "runs": runs,
                        "cex_input": input_cex.map(complex_vec_json),
                        "cex_output": output_cex.map(|(a, b)| (complex_vec_json(a), complex_vec_json(b))),
                    }),
                };
            }
            if verdict == EquivalenceCriterion::NoInformation {
                break; // basis states exhausted
            }
        }
        CheckerReport {
            checker: self.name(),
            criterion: EquivalenceCriterion::ProbablyEquivalent,
            detail: serde_json::json!({"runs": runs}),
        }
    }
}

fn complex_vec_json(v: Vec<Complex64>) -> serde_json::Value {
    serde_json::Value::Array(
        v.into_iter()
            .map(|c| serde_json::json!([c.re, c.im]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_pair_equals_itself() {
        let c1 = Circuit::bell().unwrap();
        let c2 = Circuit::bell().unwrap();
        let mut config = Configuration::default();
        config.seed = 42;
        config.max_sims = 8;
        let mut checker = SimulationChecker::new(&c1, &c2, &config);
        let done = AtomicBool::new(false);
        let report = checker.run(&done);
        assert!(report.criterion.is_equivalent());
    }

    #[test]
    fn test_extra_z_gate_detected_not_equivalent() {
        use arvak_ir::QubitId;
        let mut c1 = Circuit::with_size("c1", 1, 0);
        c1.x(QubitId(0)).unwrap();
        let mut c2 = Circuit::with_size("c2", 1, 0);
        c2.x(QubitId(0)).unwrap();
        c2.z(QubitId(0)).unwrap();

        let mut config = Configuration::default();
        config.seed = 7;
        config.state_type = StateType::ComputationalBasis;
        config.max_sims = 8;
        let mut checker = SimulationChecker::new(&c1, &c2, &config);
        let done = AtomicBool::new(false);
        let report = checker.run(&done);
        assert_eq!(report.criterion, EquivalenceCriterion::NotEquivalent);
    }
}
