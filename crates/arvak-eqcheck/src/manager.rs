//! The equivalence-checking manager (spec §4.H): runs the preprocessing
//! pipeline, then races the enabled checkers to a verdict, sequentially or
//! in parallel, honoring a configured timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arvak_ir::Circuit;
use tracing::{debug, info, instrument};

use crate::checkers::alternating::AlternatingChecker;
use crate::checkers::construction::ConstructionChecker;
use crate::checkers::simulation::SimulationChecker;
use crate::checkers::zx::ZxChecker;
use crate::checkers::{Checker, CheckerReport};
use crate::config::{ApplicationSchemeKind, Configuration};
use crate::criterion::EquivalenceCriterion;
use crate::error::{EqCheckError, EqCheckResult};
use crate::preprocess;

/// Aggregate outcome of one equivalence-checking run (spec §4.H result
/// aggregation): per-circuit metadata, timings, every checker's report, and
/// the final verdict. Still derives `Serialize` and offers [`Results::json`]
/// regardless of the Non-goals around CLI/file-format surfaces (§14) — those
/// exclude external collaborators, not the result type itself.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Results {
    /// Name of the first (preprocessed) circuit.
    pub circuit1_name: String,
    /// Name of the second (preprocessed) circuit.
    pub circuit2_name: String,
    /// Qubit count of the first circuit after preprocessing.
    pub circuit1_qubits: usize,
    /// Qubit count of the second circuit after preprocessing.
    pub circuit2_qubits: usize,
    /// Wall-clock time spent in preprocessing, in milliseconds.
    pub preprocessing_time_ms: u128,
    /// Wall-clock time spent running checkers, in milliseconds.
    pub checking_time_ms: u128,
    /// Every checker's report, in the order each one finished.
    pub checker_reports: Vec<CheckerReport>,
    /// The final verdict.
    pub criterion: EquivalenceCriterion,
}

impl Results {
    /// Serialize to a pretty-printed JSON string.
    pub fn json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Orchestrates one equivalence check between two circuits.
pub struct EquivalenceCheckingManager {
    c1: Circuit,
    c2: Circuit,
    config: Configuration,
}

impl EquivalenceCheckingManager {
    /// Build a manager for `c1` vs `c2` under `config`.
    ///
    /// Fails with `UsageError` if the construction application scheme is
    /// `Lookahead`: `ConstructionChecker` drives its two task managers with
    /// a plain [`crate::application_scheme::ApplicationScheme::next`] call,
    /// which always returns `(0, 0)` for `Lookahead` (it expects to be
    /// driven through `lookahead_step` instead, which only the alternating
    /// checker calls), so a construction run configured this way would
    /// never advance past the first step.
    pub fn new(c1: Circuit, c2: Circuit, config: Configuration) -> EqCheckResult<Self> {
        if matches!(config.application.construction_scheme, ApplicationSchemeKind::Lookahead) {
            return Err(EqCheckError::UsageError(
                "Lookahead application scheme is only valid for the alternating checker".to_string(),
            ));
        }
        Ok(Self { c1, c2, config })
    }

    /// Run the full check: preprocess both circuits, then race the enabled
    /// checkers to a verdict.
    #[instrument(skip(self), fields(c1 = %self.c1.name(), c2 = %self.c2.name()))]
    pub fn run(&self) -> EqCheckResult<Results> {
        if !self.config.anything_to_execute() {
            info!("no checkers enabled, returning NoInformation");
            return Ok(Results {
                circuit1_name: self.c1.name().to_string(),
                circuit2_name: self.c2.name().to_string(),
                circuit1_qubits: self.c1.num_qubits(),
                circuit2_qubits: self.c2.num_qubits(),
                preprocessing_time_ms: 0,
                checking_time_ms: 0,
                checker_reports: Vec::new(),
                criterion: EquivalenceCriterion::NoInformation,
            });
        }

        let pre_start = Instant::now();
        let (p1, p2) = preprocess::preprocess_pair(&self.c1, &self.c2, &self.config.optimizations)?;
        let preprocessing_time_ms = pre_start.elapsed().as_millis();
        debug!(preprocessing_time_ms, qubits = p1.num_qubits(), "preprocessing complete");

        let done = Arc::new(AtomicBool::new(false));
        let timeout = spawn_timeout(self.config.timeout_ms, done.clone());

        let check_start = Instant::now();
        let reports = if self.config.parallel && !self.config.only_single_task() {
            self.run_parallel(&p1, &p2, &done)
        } else {
            self.run_sequential(&p1, &p2, &done)
        };
        let checking_time_ms = check_start.elapsed().as_millis();

        done.store(true, Ordering::Release);
        if let Some((handle, signal)) = timeout {
            let (lock, cvar) = &*signal;
            *lock.lock().expect("timeout mutex poisoned") = true;
            cvar.notify_all();
            let _ = handle.join();
        }

        let only_zx = self.config.only_zx_checker_configured();
        let criterion = aggregate_criterion(&reports, only_zx);
        info!(%criterion, checking_time_ms, "equivalence check finished");

        Ok(Results {
            circuit1_name: p1.name().to_string(),
            circuit2_name: p2.name().to_string(),
            circuit1_qubits: p1.num_qubits(),
            circuit2_qubits: p2.num_qubits(),
            preprocessing_time_ms,
            checking_time_ms,
            checker_reports: reports,
            criterion,
        })
    }

    /// Sequential execution (spec §4.H): Simulation loop, then Alternating,
    /// then Construction (either explicitly enabled, or as the fallback
    /// when Alternating is enabled but `can_handle` rejects the pair), then
    /// ZX. Stops at the first definitive verdict.
    fn run_sequential(&self, c1: &Circuit, c2: &Circuit, done: &AtomicBool) -> Vec<CheckerReport> {
        let mut reports = Vec::new();
        let alternating_eligible = AlternatingChecker::can_handle(c1, c2);

        if self.config.run_simulation_checker && self.config.max_sims > 0 {
            let mut checker = SimulationChecker::new(c1, c2, &self.config);
            let report = checker.run(done);
            let stop = report.criterion.is_definitive();
            reports.push(report);
            if stop {
                return reports;
            }
        }

        if self.config.run_alternating_checker && alternating_eligible {
            let mut checker = AlternatingChecker::new(c1, c2, &self.config);
            let report = checker.run(done);
            let stop = report.criterion.is_definitive();
            reports.push(report);
            if stop {
                return reports;
            }
        }

        let need_construction =
            self.config.run_construction_checker || (self.config.run_alternating_checker && !alternating_eligible);
        if need_construction {
            let mut checker = ConstructionChecker::new(c1, c2, &self.config);
            let report = checker.run(done);
            let stop = report.criterion.is_definitive();
            reports.push(report);
            if stop {
                return reports;
            }
        }

        if self.config.run_zx_checker {
            let mut checker = ZxChecker::new(c1, c2, &self.config);
            let report = checker.run(done);
            reports.push(report);
        }

        reports
    }

    /// Parallel execution (spec §4.H): one thread per enabled-and-eligible
    /// checker, reporting through an mpsc channel (the Rust-idiomatic
    /// thread-safe queue in place of the original's hand-rolled lock-based
    /// list). The main thread takes the first report that settles the
    /// verdict, sets `done`, and joins every thread before returning —
    /// cancellation is cooperative, never forced.
    ///
    /// Unlike the original's "up to `max_sims` simulation threads", the
    /// simulation checker here runs its whole `max_sims` loop on a single
    /// thread: it already owns one `Package` exclusively and a `Package` is
    /// never shared across threads (spec §5), so splitting its internal
    /// loop across OS threads would need a second package-sharing scheme
    /// with no grounding elsewhere in this crate.
    fn run_parallel(&self, c1: &Circuit, c2: &Circuit, done: &Arc<AtomicBool>) -> Vec<CheckerReport> {
        let (tx, rx) = mpsc::channel::<CheckerReport>();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        let alternating_eligible = AlternatingChecker::can_handle(c1, c2);
        let need_construction =
            self.config.run_construction_checker || (self.config.run_alternating_checker && !alternating_eligible);

        if self.config.run_simulation_checker && self.config.max_sims > 0 {
            spawn_checker(SimulationChecker::new(c1, c2, &self.config), done.clone(), tx.clone(), &mut handles);
        }
        if self.config.run_alternating_checker && alternating_eligible {
            spawn_checker(AlternatingChecker::new(c1, c2, &self.config), done.clone(), tx.clone(), &mut handles);
        }
        if need_construction {
            spawn_checker(ConstructionChecker::new(c1, c2, &self.config), done.clone(), tx.clone(), &mut handles);
        }
        if self.config.run_zx_checker {
            spawn_checker(ZxChecker::new(c1, c2, &self.config), done.clone(), tx.clone(), &mut handles);
        }
        drop(tx);

        let only_zx = self.config.only_zx_checker_configured();
        let mut reports = Vec::with_capacity(handles.len());
        for report in rx.iter() {
            let stop = report.criterion.is_definitive()
                || (report.criterion == EquivalenceCriterion::ProbablyNotEquivalent
                    && only_zx
                    && report.checker == "zx");
            reports.push(report);
            if stop {
                done.store(true, Ordering::Release);
                break;
            }
        }

        for handle in handles {
            let _ = handle.join();
        }
        reports
    }
}

fn spawn_checker<C: Checker + Send + 'static>(
    mut checker: C,
    done: Arc<AtomicBool>,
    tx: mpsc::Sender<CheckerReport>,
    handles: &mut Vec<JoinHandle<()>>,
) {
    handles.push(thread::spawn(move || {
        let report = checker.run(&done);
        let _ = tx.send(report);
    }));
}

/// Combines every report gathered into the final verdict: the first
/// definitive report wins outright; a ZX `ProbablyNotEquivalent` is final
/// only when the ZX checker was the only one configured (spec §4.H);
/// otherwise the best `ProbablyEquivalent` seen stands in for "no
/// counterexample found, no proof attempted", falling back to
/// `NoInformation` when nothing else was learned.
fn aggregate_criterion(reports: &[CheckerReport], only_zx: bool) -> EquivalenceCriterion {
    let mut best = EquivalenceCriterion::NoInformation;
    for report in reports {
        if report.criterion.is_definitive() {
            return report.criterion;
        }
        if report.criterion == EquivalenceCriterion::ProbablyNotEquivalent && only_zx {
            return report.criterion;
        }
        if report.criterion == EquivalenceCriterion::ProbablyEquivalent && best == EquivalenceCriterion::NoInformation
        {
            best = report.criterion;
        }
    }
    best
}

/// Spawns the timeout thread (spec §5): waits on a condition variable for
/// either the configured duration or an earlier completion signal. Returns
/// `None` when no timeout is configured (`timeout_ms == 0`).
fn spawn_timeout(
    timeout_ms: u64,
    done: Arc<AtomicBool>,
) -> Option<(JoinHandle<()>, Arc<(Mutex<bool>, Condvar)>)> {
    if timeout_ms == 0 {
        return None;
    }
    let signal = Arc::new((Mutex::new(false), Condvar::new()));
    let signal_thread = signal.clone();
    let handle = thread::spawn(move || {
        let (lock, cvar) = &*signal_thread;
        let guard = lock.lock().expect("timeout mutex poisoned");
        let (_guard, wait_result) = cvar
            .wait_timeout_while(guard, Duration::from_millis(timeout_ms), |&mut finished| !finished)
            .expect("timeout mutex poisoned");
        if wait_result.timed_out() {
            done.store(true, Ordering::Release);
        }
    });
    Some((handle, signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_pair_equals_itself_sequential() {
        let c1 = Circuit::bell().unwrap();
        let c2 = Circuit::bell().unwrap();
        let mut config = Configuration::default();
        config.parallel = false;
        let manager = EquivalenceCheckingManager::new(c1, c2, config).unwrap();
        let results = manager.run().unwrap();
        assert!(results.criterion.is_equivalent());
        assert!(!results.checker_reports.is_empty());
    }

    #[test]
    fn test_bell_pair_equals_itself_parallel() {
        let c1 = Circuit::bell().unwrap();
        let c2 = Circuit::bell().unwrap();
        let mut config = Configuration::default();
        config.parallel = true;
        let manager = EquivalenceCheckingManager::new(c1, c2, config).unwrap();
        let results = manager.run().unwrap();
        assert!(results.criterion.is_equivalent());
    }

    #[test]
    fn test_extra_gate_detected_not_equivalent() {
        use arvak_ir::QubitId;
        let mut c1 = Circuit::with_size("c1", 1, 0);
        c1.x(QubitId(0)).unwrap();
        let mut c2 = Circuit::with_size("c2", 1, 0);
        c2.x(QubitId(0)).unwrap();
        c2.z(QubitId(0)).unwrap();

        let mut config = Configuration::default();
        config.run_construction_checker = true;
        let manager = EquivalenceCheckingManager::new(c1, c2, config).unwrap();
        let results = manager.run().unwrap();
        assert_eq!(results.criterion, EquivalenceCriterion::NotEquivalent);
    }

    #[test]
    fn test_no_checkers_enabled_yields_no_information() {
        let c1 = Circuit::bell().unwrap();
        let c2 = Circuit::bell().unwrap();
        let mut config = Configuration::default();
        config.run_simulation_checker = false;
        config.max_sims = 0;
        config.run_alternating_checker = false;
        config.run_construction_checker = false;
        config.run_zx_checker = false;
        let manager = EquivalenceCheckingManager::new(c1, c2, config).unwrap();
        let results = manager.run().unwrap();
        assert_eq!(results.criterion, EquivalenceCriterion::NoInformation);
        assert!(results.checker_reports.is_empty());
    }

    #[test]
    fn test_lookahead_construction_scheme_rejected() {
        let c1 = Circuit::bell().unwrap();
        let c2 = Circuit::bell().unwrap();
        let mut config = Configuration::default();
        config.application.construction_scheme = ApplicationSchemeKind::Lookahead;
        let result = EquivalenceCheckingManager::new(c1, c2, config);
        assert!(matches!(result, Err(EqCheckError::UsageError(_))));
    }

    #[test]
    fn test_timeout_yields_no_information_without_hanging() {
        use arvak_ir::QubitId;
        let mut c1 = Circuit::with_size("c1", 4, 0);
        let mut c2 = Circuit::with_size("c2", 4, 0);
        for _ in 0..2000 {
            for q in 0..4u32 {
                c1.h(QubitId(q)).unwrap();
                c2.h(QubitId(q)).unwrap();
            }
        }
        let mut config = Configuration::default();
        config.timeout_ms = 1;
        config.run_simulation_checker = false;
        config.run_construction_checker = true;
        config.run_alternating_checker = false;
        config.run_zx_checker = false;
        let manager = EquivalenceCheckingManager::new(c1, c2, config).unwrap();
        let results = manager.run().unwrap();
        assert!(matches!(
            results.criterion,
            EquivalenceCriterion::NoInformation | EquivalenceCriterion::Equivalent
        ));
    }
}
