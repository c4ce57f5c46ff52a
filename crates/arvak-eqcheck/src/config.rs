//! Configuration for an equivalence-checking run.
//!
//! Mirrors spec.md §6's option table exactly: same groups, same option
//! names, same defaults. Loadable from JSON or YAML the same way
//! `arvak_ir::noise::NoiseProfile` is loaded from a file.

use std::path::PathBuf;
use std::thread::available_parallelism;

use serde::{Deserialize, Serialize};

/// Which application scheme (spec §4.C) a checker should use to decide how
/// many gates to advance from each circuit per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ApplicationSchemeKind {
    /// Advance each circuit to completion in one step.
    Sequential,
    /// Advance one gate from each circuit per step.
    OneToOne,
    /// Advance `(r, 1)` or `(1, r)` per the larger-to-smaller gate ratio.
    Proportional,
    /// Cost-driven advancement using a profile file or a built-in cost function.
    GateCost {
        /// Path to a gate-cost profile file (line format `<gate> <n_controls> <cost>`).
        /// Empty when a cost function should be used instead.
        #[serde(default)]
        profile: Option<PathBuf>,
    },
    /// Lookahead scheme: picks whichever provisional application yields a
    /// smaller resulting DD. Matrices only.
    Lookahead,
}

impl Default for ApplicationSchemeKind {
    fn default() -> Self {
        Self::Proportional
    }
}

/// Initial-state family the simulation checker samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    /// Uniform random computational basis state, distinct across runs.
    ComputationalBasis,
    /// Per-qubit uniform choice among {|0>,|1>,|+>,|->,|L>,|R>}.
    Random1QBasis,
    /// A random Clifford circuit of depth ceil(log2 n_data) applied to |0...0>.
    Stabilizer,
}

impl Default for StateType {
    fn default() -> Self {
        Self::ComputationalBasis
    }
}

/// The eight optional preprocessing toggles of spec §4.H (steps 1-8; strip-idle
/// and ancilla/garbage alignment, steps 9-10, always run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Optimizations {
    /// Step 1: eliminate mid-circuit resets/measurements when possible.
    pub transform_dynamic_circuit: bool,
    /// Step 2: drop diagonal gates that only precede a measurement.
    pub remove_diagonal_gates_before_measure: bool,
    /// Step 3: recognize CNOT-triple/CNOT-pair-around-SWAP patterns.
    pub reconstruct_swaps: bool,
    /// Step 4: fuse consecutive single-qubit gates on the same qubit.
    pub fuse_single_qubit_gates: bool,
    /// Step 5: canonicalize operation order subject to commutation.
    pub reorder_operations: bool,
    /// Step 6: fold a trailing output permutation back into the initial layout.
    pub backpropagate_output_permutation: bool,
    /// Step 7: rewrite SWAPs/permutations into index remappings.
    pub elide_permutations: bool,
    /// Step 8: drop trailing measurements so the remaining circuit is unitary.
    pub remove_final_measurements: bool,
}

impl Default for Optimizations {
    fn default() -> Self {
        Self {
            transform_dynamic_circuit: true,
            remove_diagonal_gates_before_measure: true,
            reconstruct_swaps: true,
            fuse_single_qubit_gates: true,
            reorder_operations: true,
            backpropagate_output_permutation: true,
            elide_permutations: true,
            remove_final_measurements: true,
        }
    }
}

/// Which application scheme each checker that needs one should use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSchemes {
    /// Scheme for the construction checker.
    pub construction_scheme: ApplicationSchemeKind,
    /// Scheme for the simulation checker.
    pub simulation_scheme: ApplicationSchemeKind,
    /// Scheme for the alternating checker.
    pub alternating_scheme: ApplicationSchemeKind,
    /// Fallback cost used for gate identifiers absent from a loaded profile.
    pub default_gate_cost: u32,
}

impl Default for ApplicationSchemes {
    fn default() -> Self {
        Self {
            construction_scheme: ApplicationSchemeKind::Proportional,
            simulation_scheme: ApplicationSchemeKind::Proportional,
            alternating_scheme: ApplicationSchemeKind::Proportional,
            default_gate_cost: 1,
        }
    }
}

/// All knobs controlling an equivalence-checking run (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    // --- execution ---
    /// Run enabled checkers concurrently.
    pub parallel: bool,
    /// Cap on the number of parallel checker threads (floor 2).
    pub nthreads: usize,
    /// Wall-clock timeout in milliseconds; 0 means no timeout.
    pub timeout_ms: u64,
    /// Enable the construction checker.
    pub run_construction_checker: bool,
    /// Enable the simulation checker.
    pub run_simulation_checker: bool,
    /// Enable the alternating checker.
    pub run_alternating_checker: bool,
    /// Enable the ZX checker.
    pub run_zx_checker: bool,
    /// DD complex-number tolerance `eps`.
    pub numerical_tolerance: f64,

    // --- optimizations ---
    /// The eight optional preprocessing toggles.
    pub optimizations: Optimizations,

    // --- application ---
    /// Per-checker application schemes and the default gate cost.
    pub application: ApplicationSchemes,

    // --- functionality ---
    /// Threshold for `is_close_to_identity` matrix equality.
    pub trace_threshold: f64,
    /// Treat garbage qubits as summed out (partial equivalence).
    pub check_partial_equivalence: bool,

    // --- simulation ---
    /// Fidelity tolerance for state-vector equality.
    pub fidelity_threshold: f64,
    /// Max simulation runs before declaring `ProbablyEquivalent`. 0 disables
    /// the simulation checker outright.
    pub max_sims: usize,
    /// Initial-state family for the simulation checker.
    pub state_type: StateType,
    /// PRNG seed; 0 means nondeterministic.
    pub seed: u64,
    /// Retain the counterexample input state vector on `NotEquivalent`.
    pub store_cex_input: bool,
    /// Retain the counterexample output state vectors on `NotEquivalent`.
    pub store_cex_output: bool,

    // --- parameterized (out of core; carried for forward compatibility) ---
    /// Tolerance for the symbolic/parameterized extension.
    pub parameterized_tolerance: f64,
    /// Number of additional numeric instantiations for the symbolic extension.
    pub n_additional_instantiations: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            parallel: true,
            nthreads: Self::nthreads_default(),
            timeout_ms: 0,
            run_construction_checker: false,
            run_simulation_checker: true,
            run_alternating_checker: true,
            run_zx_checker: true,
            numerical_tolerance: 2e-13,
            optimizations: Optimizations::default(),
            application: ApplicationSchemes::default(),
            trace_threshold: 1e-8,
            check_partial_equivalence: false,
            fidelity_threshold: 1e-8,
            max_sims: Self::max_sims_default(),
            state_type: StateType::default(),
            seed: 0,
            store_cex_input: false,
            store_cex_output: false,
            parameterized_tolerance: 1e-8,
            n_additional_instantiations: 0,
        }
    }
}

impl Configuration {
    /// Default thread cap: `max(2, available_parallelism)`.
    pub fn nthreads_default() -> usize {
        available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1).max(2)
    }

    /// Default simulation budget: `max(16, available_parallelism - 2)`,
    /// mirroring the original's `computeMaxSims()`.
    pub fn max_sims_default() -> usize {
        let cores = available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1);
        cores.saturating_sub(2).max(16)
    }

    /// Whether any checker is enabled at all.
    pub fn anything_to_execute(&self) -> bool {
        self.run_construction_checker
            || (self.run_simulation_checker && self.max_sims > 0)
            || self.run_alternating_checker
            || self.run_zx_checker
    }

    /// Whether exactly one checker is configured to run (forces sequential
    /// execution regardless of `parallel`).
    pub fn only_single_task(&self) -> bool {
        let flags = [
            self.run_construction_checker,
            self.run_simulation_checker && self.max_sims > 0,
            self.run_alternating_checker,
            self.run_zx_checker,
        ];
        flags.iter().filter(|&&b| b).count() == 1
    }

    /// Whether the ZX checker is the only one configured.
    pub fn only_zx_checker_configured(&self) -> bool {
        self.run_zx_checker
            && !self.run_construction_checker
            && !self.run_alternating_checker
            && !(self.run_simulation_checker && self.max_sims > 0)
    }

    /// Whether the simulation checker is the only one configured.
    pub fn only_simulation_checker_configured(&self) -> bool {
        self.run_simulation_checker
            && self.max_sims > 0
            && !self.run_construction_checker
            && !self.run_alternating_checker
            && !self.run_zx_checker
    }

    /// Load a configuration from a JSON or YAML file, selected by extension
    /// (`.json` vs anything else, defaulting to YAML).
    pub fn from_file(path: &std::path::Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&text)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        } else {
            serde_yaml_ng::from_str(&text)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }
    }
}

/// A per-gate application cost, parsed from a profile file.
///
/// Line format: `<gate_identifier> <n_controls> <integer_cost>`. Unknown
/// `(gate, n_controls)` keys fall back to `default_cost` with a `warn!` log.
#[derive(Debug, Clone, Default)]
pub struct GateCostProfile {
    costs: rustc_hash::FxHashMap<(String, u32), u32>,
}

impl GateCostProfile {
    /// Parse a profile file.
    pub fn from_file(path: &std::path::Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_str(&text))
    }

    /// Parse profile text directly (used by tests and `from_file`).
    pub fn from_str(text: &str) -> Self {
        let mut costs = rustc_hash::FxHashMap::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(gate), Some(n_controls), Some(cost)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            if let (Ok(n_controls), Ok(cost)) = (n_controls.parse::<u32>(), cost.parse::<u32>()) {
                costs.insert((gate.to_string(), n_controls), cost);
            }
        }
        Self { costs }
    }

    /// Look up the cost for `(gate, n_controls)`, falling back to
    /// `default_cost` and logging a warning when the key is unknown.
    pub fn cost(&self, gate: &str, n_controls: u32, default_cost: u32) -> u32 {
        match self.costs.get(&(gate.to_string(), n_controls)) {
            Some(&c) => c,
            None => {
                tracing::warn!(gate, n_controls, "unknown gate in cost profile, using default");
                default_cost
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec() {
        let cfg = Configuration::default();
        assert!(cfg.parallel);
        assert!(!cfg.run_construction_checker);
        assert!(cfg.run_simulation_checker);
        assert!(cfg.run_alternating_checker);
        assert!(cfg.run_zx_checker);
        assert_eq!(cfg.timeout_ms, 0);
        assert!((cfg.numerical_tolerance - 2e-13).abs() < 1e-20);
        assert!((cfg.trace_threshold - 1e-8).abs() < 1e-20);
        assert!((cfg.fidelity_threshold - 1e-8).abs() < 1e-20);
        assert!(cfg.max_sims >= 16);
        assert!(cfg.nthreads >= 2);
    }

    #[test]
    fn test_only_single_task_detection() {
        let mut cfg = Configuration::default();
        cfg.run_simulation_checker = false;
        cfg.max_sims = 0;
        cfg.run_zx_checker = false;
        assert!(cfg.only_single_task());
        assert!(!cfg.only_zx_checker_configured());
    }

    #[test]
    fn test_only_zx_checker_configured() {
        let mut cfg = Configuration::default();
        cfg.run_alternating_checker = false;
        cfg.run_simulation_checker = false;
        assert!(cfg.only_zx_checker_configured());
    }

    #[test]
    fn test_gate_cost_profile_parses_and_falls_back() {
        let profile = GateCostProfile::from_str("cx 1 2\n# comment\nh 0 1\n");
        assert_eq!(profile.cost("cx", 1, 1), 2);
        assert_eq!(profile.cost("h", 0, 1), 1);
        assert_eq!(profile.cost("unknown", 0, 5), 5);
    }
}
