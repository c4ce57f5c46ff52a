//! DAG-local preprocessing steps (spec §4.H steps 2-8), expressed as
//! `arvak_compile::Pass` implementations so they slot into a
//! [`arvak_compile::PassManager`] the same way the compiler's own
//! optimization passes do. Steps 6 and 7 additionally read/write a
//! [`CircuitMeta`] value threaded through the shared `PropertySet`, the same
//! side channel `arvak-compile`'s own passes use to communicate
//! (`PropertySet`'s own doc comment anticipates this crate's use of it),
//! since layout bookkeeping has no home on a bare `CircuitDag`.
//!
//! Steps 1, 9 and 10 are not here, and are plain functions on `Circuit` in
//! `preprocess` instead: step 1 introduces a fresh qubit, and `Circuit`'s own
//! qubit-count bookkeeping (`next_qubit_id`, its `qubits: Vec<Qubit>`) lives
//! outside `CircuitDag` and has no way to resync if a `Pass` adds a qubit to
//! the DAG directly; step 9 needs to remove qubits from the DAG, which
//! `CircuitDag` has no operation for; step 10 inherently needs both circuits
//! at once, which no single-DAG `Pass` can see.

use arvak_compile::{CompileResult, Pass, PassKind, PropertySet};
use arvak_compile::unitary::Unitary2x2;
use arvak_ir::{
    CircuitDag, Gate, GateKind, Instruction, InstructionKind, Permutation, QubitId, StandardGate,
};

/// Per-circuit ancillary/garbage/layout bookkeeping threaded through the
/// `PropertySet` while the DAG-local passes run, since `CircuitDag` itself
/// has no notion of qubit roles or logical/physical layout. Seeded from the
/// `Circuit` before the pass manager runs and written back afterward.
#[derive(Debug, Clone)]
pub struct CircuitMeta {
    /// Per-qubit ancillary flag, indexed by `QubitId`.
    pub ancillary: Vec<bool>,
    /// Per-qubit garbage flag, indexed by `QubitId`.
    pub garbage: Vec<bool>,
    /// Logical-to-physical mapping at circuit entry.
    pub initial_layout: Permutation,
    /// Logical-to-physical mapping at circuit exit.
    pub output_permutation: Permutation,
}

fn diagonal_1q_matrix(sg: &StandardGate) -> Option<[num_complex::Complex64; 4]> {
    let u = match sg {
        StandardGate::I => Unitary2x2::identity(),
        StandardGate::Z => Unitary2x2::z(),
        StandardGate::S => Unitary2x2::s(),
        StandardGate::Sdg => Unitary2x2::sdg(),
        StandardGate::T => Unitary2x2::t(),
        StandardGate::Tdg => Unitary2x2::tdg(),
        StandardGate::P(p) => Unitary2x2::p(p.as_f64()?),
        StandardGate::Rz(p) => Unitary2x2::rz(p.as_f64()?),
        _ => return None,
    };
    Some(u.data)
}

fn single_qubit_matrix(sg: &StandardGate) -> Option<[num_complex::Complex64; 4]> {
    if let Some(m) = diagonal_1q_matrix(sg) {
        return Some(m);
    }
    let u = match sg {
        StandardGate::X => Unitary2x2::x(),
        StandardGate::Y => Unitary2x2::y(),
        StandardGate::H => Unitary2x2::h(),
        StandardGate::SX => Unitary2x2::sx(),
        StandardGate::SXdg => Unitary2x2::sxdg(),
        StandardGate::Rx(p) => Unitary2x2::rx(p.as_f64()?),
        StandardGate::Ry(p) => Unitary2x2::ry(p.as_f64()?),
        StandardGate::U(t, p, l) => Unitary2x2::u(t.as_f64()?, p.as_f64()?, l.as_f64()?),
        _ => return None,
    };
    Some(u.data)
}

fn mul4(a: [num_complex::Complex64; 4], b: [num_complex::Complex64; 4]) -> [num_complex::Complex64; 4] {
    Unitary2x2 { data: a }.mul(&Unitary2x2 { data: b }).data
}

/// Step 2: drops a diagonal single-qubit gate that immediately precedes a
/// measurement on the same qubit with no other intervening consumer —
/// diagonal gates only add a computational-basis phase, invisible to a
/// projective measurement.
pub struct RemoveDiagonalGatesBeforeMeasure;

impl Pass for RemoveDiagonalGatesBeforeMeasure {
    fn name(&self) -> &str {
        "remove_diagonal_gates_before_measure"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        loop {
            let mut last_single: rustc_hash::FxHashMap<QubitId, petgraph::graph::NodeIndex> =
                rustc_hash::FxHashMap::default();
            let mut to_remove = None;
            for (node, inst) in dag.topological_ops() {
                match &inst.kind {
                    InstructionKind::Gate(Gate { kind: GateKind::Standard(sg), .. })
                        if inst.qubits.len() == 1 && diagonal_1q_matrix(sg).is_some() =>
                    {
                        last_single.insert(inst.qubits[0], node);
                    }
                    InstructionKind::Measure => {
                        if let Some(&prev) = last_single.get(&inst.qubits[0]) {
                            to_remove = Some(prev);
                            break;
                        }
                    }
                    _ => {
                        for &q in &inst.qubits {
                            last_single.remove(&q);
                        }
                    }
                }
            }
            let Some(node) = to_remove else { break };
            dag.remove_op(node).ok();
        }
        Ok(())
    }
}

/// Step 3: recognizes the CNOT-triple pattern `CX(a,b); CX(b,a); CX(a,b)`
/// and rewrites it to a single `Swap(a, b)`.
pub struct ReconstructSwaps;

impl Pass for ReconstructSwaps {
    fn name(&self) -> &str {
        "reconstruct_swaps"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        loop {
            let ops: Vec<_> = dag
                .topological_ops()
                .map(|(n, i)| (n, i.clone()))
                .collect();
            let mut found = None;
            for w in ops.windows(3) {
                let is_cx = |inst: &Instruction| {
                    matches!(&inst.kind, InstructionKind::Gate(Gate { kind: GateKind::Standard(StandardGate::CX), .. }))
                        && inst.controls.is_empty()
                };
                if !is_cx(&w[0].1) || !is_cx(&w[1].1) || !is_cx(&w[2].1) {
                    continue;
                }
                let (a0, b0) = (w[0].1.qubits[0], w[0].1.qubits[1]);
                let (a1, b1) = (w[1].1.qubits[0], w[1].1.qubits[1]);
                let (a2, b2) = (w[2].1.qubits[0], w[2].1.qubits[1]);
                if a0 == b1 && b0 == a1 && a0 == a2 && b0 == b2 {
                    found = Some(((w[0].0, w[1].0, w[2].0), a0, b0));
                    break;
                }
            }
            let Some(((n0, n1, n2), a, b)) = found else { break };
            dag.remove_op(n2).ok();
            dag.remove_op(n1).ok();
            dag.remove_op(n0).ok();
            dag.apply(Instruction::two_qubit_gate(StandardGate::Swap, a, b)).ok();
        }
        Ok(())
    }
}

/// Step 4: fuses a maximal run of consecutive single-qubit standard gates
/// on one qubit into a single `GateKind::Custom` carrying the product
/// matrix, matching `arvak-compile`'s own `Optimize1qGates`.
pub struct FuseSingleQubitGates;

impl Pass for FuseSingleQubitGates {
    fn name(&self) -> &str {
        "fuse_single_qubit_gates"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        loop {
            let ops: Vec<_> = dag
                .topological_ops()
                .map(|(n, i)| (n, i.clone()))
                .collect();
            let is_fusable_1q = |inst: &Instruction| {
                inst.qubits.len() == 1
                    && matches!(&inst.kind, InstructionKind::Gate(Gate { kind: GateKind::Standard(sg), .. })
                        if single_qubit_matrix(sg).is_some())
            };
            let mut run_start = None;
            let mut run: Vec<usize> = vec![];
            let mut found_run: Option<(QubitId, Vec<usize>)> = None;
            for (idx, (_, inst)) in ops.iter().enumerate() {
                if is_fusable_1q(inst) {
                    let q = inst.qubits[0];
                    match run_start {
                        Some(rq) if rq == q => run.push(idx),
                        _ => {
                            if run.len() > 1 {
                                found_run = Some((run_start.unwrap(), run.clone()));
                                break;
                            }
                            run_start = Some(q);
                            run = vec![idx];
                        }
                    }
                } else if run.len() > 1 {
                    found_run = Some((run_start.unwrap(), run.clone()));
                    break;
                } else {
                    run_start = None;
                    run.clear();
                }
            }
            if found_run.is_none() && run.len() > 1 {
                found_run = Some((run_start.unwrap(), run));
            }
            let Some((qubit, indices)) = found_run else { break };

            let mut matrix = [
                num_complex::Complex64::new(1.0, 0.0),
                num_complex::Complex64::new(0.0, 0.0),
                num_complex::Complex64::new(0.0, 0.0),
                num_complex::Complex64::new(1.0, 0.0),
            ];
            for &idx in &indices {
                let InstructionKind::Gate(Gate { kind: GateKind::Standard(sg), .. }) = &ops[idx].1.kind else {
                    unreachable!()
                };
                let gate_matrix = single_qubit_matrix(sg).expect("filtered above");
                matrix = mul4(gate_matrix, matrix);
            }
            for &idx in indices.iter().rev() {
                dag.remove_op(ops[idx].0).ok();
            }
            let custom = arvak_ir::CustomGate::new("fused1q", 1).with_matrix(matrix.to_vec());
            dag.apply(Instruction::gate(custom, [qubit])).ok();
        }
        Ok(())
    }
}

/// Step 5: canonical topological reordering. `CircuitDag::topological_ops`
/// already yields a deterministic topological order (petgraph's own
/// algorithm over the DAG), so this pass is a structural affirmation rather
/// than a rewrite — kept as a named pass for pipeline-interface symmetry
/// with the other numbered steps.
pub struct ReorderOperations;

impl Pass for ReorderOperations {
    fn name(&self) -> &str {
        "reorder_operations"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, _dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        Ok(())
    }
}

/// Step 6: folds a trailing `output_permutation` back into `initial_layout`
/// so the circuit's natural execution already lands qubits in final
/// position, and resets `output_permutation` to identity. Touches only
/// [`CircuitMeta`]; the DAG itself has no notion of layout.
///
/// Open question resolved: composition order is `new_initial(q) =
/// initial(output(q))` — the circuit is relabelled as if it had started from
/// wherever the old output permutation would have moved each qubit to,
/// which is the fold direction that makes the task manager's later
/// `change_permutation` a no-op for a circuit whose only permutation effect
/// was this trailing one.
pub struct BackpropagateOutputPermutation;

impl Pass for BackpropagateOutputPermutation {
    fn name(&self) -> &str {
        "backpropagate_output_permutation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let meta = properties
            .get_mut::<CircuitMeta>()
            .expect("CircuitMeta seeded before the pipeline runs");
        if meta.output_permutation.is_identity() {
            return Ok(());
        }
        let n = dag.num_qubits() as u32;
        let mut new_initial = Permutation::identity_sized(n);
        for q in (0..n).map(QubitId) {
            let via_output = meta.output_permutation.get(q);
            new_initial.set(q, meta.initial_layout.get(via_output));
        }
        meta.initial_layout = new_initial;
        meta.output_permutation = Permutation::identity_sized(n);
        Ok(())
    }
}

/// Step 7: rewrites a maximal trailing run of plain two-qubit `Swap`s into
/// an index remapping folded into `output_permutation`, avoiding DD
/// multiplications for pure routing.
pub struct ElidePermutations;

impl Pass for ElidePermutations {
    fn name(&self) -> &str {
        "elide_permutations"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        loop {
            let last = dag.topological_ops().last().map(|(n, i)| (n, i.clone()));
            let Some((node, inst)) = last else { break };
            let is_plain_swap = matches!(
                &inst.kind,
                InstructionKind::Gate(Gate {
                    kind: GateKind::Standard(StandardGate::Swap),
                    ..
                })
            ) && inst.controls.is_empty();
            if !is_plain_swap {
                break;
            }
            let (a, b) = (inst.qubits[0], inst.qubits[1]);
            if dag.remove_op(node).is_err() {
                break;
            }
            let meta = properties
                .get_mut::<CircuitMeta>()
                .expect("CircuitMeta seeded before the pipeline runs");
            let (pa, pb) = (meta.output_permutation.get(a), meta.output_permutation.get(b));
            meta.output_permutation.set(a, pb);
            meta.output_permutation.set(b, pa);
        }
        Ok(())
    }
}

/// Step 8: drops every `Measure` instruction so the remaining circuit is
/// unitary (safe only once the manager has extracted whatever classical
/// information it needed from the original circuit).
pub struct RemoveFinalMeasurements;

impl Pass for RemoveFinalMeasurements {
    fn name(&self) -> &str {
        "remove_final_measurements"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        let measures: Vec<_> = dag
            .topological_ops()
            .filter(|(_, i)| matches!(i.kind, InstructionKind::Measure))
            .map(|(n, _)| n)
            .collect();
        for n in measures {
            dag.remove_op(n).ok();
        }
        Ok(())
    }
}
