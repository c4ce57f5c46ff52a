//! Preprocessing pipeline (spec §4.H steps 1-10).
//!
//! Steps 2-8 are `arvak_compile::Pass` implementations in [`passes`], run
//! through a `PassManager` the way `arvak-compile`'s own optimizer chains
//! its passes (§13). Steps 6 and 7 additionally read/write a
//! [`passes::CircuitMeta`] value seeded into the shared `PropertySet` before
//! the pipeline runs, since ancillary/garbage/layout bookkeeping has no home
//! on a bare `CircuitDag`. Steps 1, 9 and 10 are plain functions here
//! instead: step 1 introduces a fresh qubit, and `Circuit`'s own qubit-count
//! bookkeeping (`next_qubit_id`, its `qubits: Vec<Qubit>`) lives outside
//! `CircuitDag` with no way for a bare `Pass` to keep it in sync; step 9
//! needs to remove qubits from the DAG, which `CircuitDag` has no operation
//! for; step 10 inherently needs both circuits at once, which no single-DAG
//! `Pass` can see.

pub mod passes;

use arvak_compile::{PassManager, PropertySet};
use arvak_ir::{Circuit, Instruction, InstructionKind, Permutation, QubitId};
use rustc_hash::FxHashMap;

use crate::config::Optimizations;
use crate::error::{EqCheckError, EqCheckResult};
use passes::CircuitMeta;

/// Whether the circuit needs step 1 at all: a `Reset`, or a `Measure` that is
/// not the last operation on its qubit.
fn is_dynamic(circuit: &Circuit) -> bool {
    let has_reset = circuit
        .dag()
        .topological_ops()
        .any(|(_, i)| matches!(i.kind, InstructionKind::Reset));
    if has_reset {
        return true;
    }
    let mut measured: FxHashMap<QubitId, bool> = FxHashMap::default();
    for (_, inst) in circuit.dag().topological_ops() {
        if matches!(inst.kind, InstructionKind::Measure) {
            measured.insert(inst.qubits[0], true);
        } else {
            for &q in &inst.qubits {
                if measured.get(&q).copied().unwrap_or(false) {
                    return true;
                }
            }
        }
    }
    false
}

/// Step 1: eliminates mid-circuit resets by routing every operation after a
/// `Reset` onto a freshly introduced qubit (non-ancillary, non-garbage),
/// then defers every measurement to the end of the circuit. A no-op when
/// the circuit has neither resets nor non-trailing measurements.
///
/// Returns `UnsupportedDynamicCircuit` up front when the circuit is dynamic
/// and the caller has this optimization disabled.
fn transform_dynamic_circuit(circuit: &mut Circuit, enabled: bool) -> EqCheckResult<()> {
    if !is_dynamic(circuit) {
        return Ok(());
    }
    if !enabled {
        return Err(EqCheckError::UnsupportedDynamicCircuit(
            "circuit contains a reset or a non-trailing measurement and \
             transform_dynamic_circuit is disabled"
                .to_string(),
        ));
    }

    loop {
        let reset = circuit
            .dag()
            .topological_ops()
            .find(|(_, i)| matches!(i.kind, InstructionKind::Reset))
            .map(|(n, i)| (n, i.qubits[0]));
        let Some((node, qubit)) = reset else { break };

        let fresh = circuit.add_qubit();
        circuit.set_ancillary(fresh, false);
        circuit.set_garbage(fresh, false);

        let later: Vec<_> = circuit
            .dag()
            .topological_ops()
            .map(|(n, _)| n)
            .skip_while(|&n| n != node)
            .skip(1)
            .collect();
        for n in later {
            if let Some(inst) = circuit.dag_mut().get_instruction_mut(n) {
                for q in inst.qubits.iter_mut() {
                    if *q == qubit {
                        *q = fresh;
                    }
                }
            }
        }
        circuit.dag_mut().remove_op(node).ok();
    }

    // Remove one measurement at a time and re-fetch indices afterward:
    // `remove_op` swap-removes, which invalidates any other stale
    // `NodeIndex` collected before the removal.
    let mut deferred = Vec::new();
    loop {
        let next = circuit
            .dag()
            .topological_ops()
            .find(|(_, i)| matches!(i.kind, InstructionKind::Measure))
            .map(|(n, _)| n);
        let Some(n) = next else { break };
        deferred.push(circuit.dag_mut().remove_op(n).ok());
    }
    for inst in deferred.into_iter().flatten() {
        circuit.dag_mut().apply(inst).ok();
    }
    Ok(())
}

/// Step 9: rebuilds the circuit without idle qubits (those with no
/// non-barrier operation), remapping qubit ids and the ancillary/garbage/
/// layout bookkeeping along with them.
fn strip_idle_qubits(circuit: &Circuit) -> EqCheckResult<Circuit> {
    let n = circuit.num_qubits() as u32;
    let idle: Vec<bool> = (0..n).map(|q| circuit.is_idle(QubitId(q))).collect();
    if !idle.iter().any(|&b| b) {
        return Ok(circuit.clone());
    }
    let keep: Vec<QubitId> = (0..n).map(QubitId).filter(|q| !idle[q.0 as usize]).collect();
    let remap: FxHashMap<QubitId, QubitId> = keep
        .iter()
        .enumerate()
        .map(|(i, &q)| (q, QubitId(i as u32)))
        .collect();

    let mut out = Circuit::with_size(circuit.name(), keep.len() as u32, circuit.num_clbits() as u32);
    for (_, inst) in circuit.dag().topological_ops() {
        let mut remapped: Instruction = inst.clone();
        for q in remapped.qubits.iter_mut() {
            *q = remap[&*q];
        }
        for c in remapped.controls.iter_mut() {
            c.qubit = remap[&c.qubit];
        }
        out.dag_mut().apply(remapped)?;
    }
    for (&old, &new) in &remap {
        out.set_ancillary(new, circuit.ancillary()[old.0 as usize]);
        out.set_garbage(new, circuit.garbage()[old.0 as usize]);
    }
    let mut new_initial = Permutation::identity_sized(keep.len() as u32);
    let mut new_output = Permutation::identity_sized(keep.len() as u32);
    for (&old, &new) in &remap {
        if let Some(&new_target) = remap.get(&circuit.initial_layout().get(old)) {
            new_initial.set(new, new_target);
        }
        if let Some(&new_target) = remap.get(&circuit.output_permutation().get(old)) {
            new_output.set(new, new_target);
        }
    }
    out.set_initial_layout(new_initial);
    out.set_output_permutation(new_output);
    Ok(out)
}

/// Step 10: pads the smaller of the two circuits with fresh ancillary
/// qubits (marked ancillary on both sides, garbage on the padded side) so
/// `c1` and `c2` end up with equal qubit counts (spec invariant I4).
fn align_ancillaries(c1: &mut Circuit, c2: &mut Circuit) {
    let (n1, n2) = (c1.num_qubits() as u32, c2.num_qubits() as u32);
    let (smaller, larger_n) = if n1 < n2 { (c1, n2) } else { (c2, n1) };
    for _ in smaller.num_qubits() as u32..larger_n {
        let qubit = QubitId(smaller.dag().num_qubits() as u32);
        smaller.dag_mut().add_qubit(qubit);
        smaller.set_ancillary(qubit, true);
        smaller.set_garbage(qubit, true);
    }
}

/// Builds the pass manager for steps 2-8, gated by `opts`.
fn build_pass_manager(opts: &Optimizations) -> PassManager {
    let mut pm = PassManager::new();
    if opts.remove_diagonal_gates_before_measure {
        pm.add_pass(passes::RemoveDiagonalGatesBeforeMeasure);
    }
    if opts.reconstruct_swaps {
        pm.add_pass(passes::ReconstructSwaps);
    }
    if opts.fuse_single_qubit_gates {
        pm.add_pass(passes::FuseSingleQubitGates);
    }
    if opts.reorder_operations {
        pm.add_pass(passes::ReorderOperations);
    }
    if opts.backpropagate_output_permutation {
        pm.add_pass(passes::BackpropagateOutputPermutation);
    }
    if opts.elide_permutations {
        pm.add_pass(passes::ElidePermutations);
    }
    if opts.remove_final_measurements {
        pm.add_pass(passes::RemoveFinalMeasurements);
    }
    pm
}

/// Runs the full per-circuit preprocessing pipeline (steps 1-9) on a single
/// circuit. Step 10 (cross-circuit) is applied separately by
/// [`preprocess_pair`] since it inherently needs both circuits.
pub fn preprocess_one(circuit: &Circuit, opts: &Optimizations) -> EqCheckResult<Circuit> {
    let mut working = circuit.clone();
    transform_dynamic_circuit(&mut working, opts.transform_dynamic_circuit)?;

    let mut properties = PropertySet::new();
    properties.insert(CircuitMeta {
        ancillary: working.ancillary().to_vec(),
        garbage: working.garbage().to_vec(),
        initial_layout: working.initial_layout().clone(),
        output_permutation: working.output_permutation().clone(),
    });

    let pm = build_pass_manager(opts);
    let mut dag = std::mem::replace(working.dag_mut(), arvak_ir::CircuitDag::new());
    pm.run(&mut dag, &mut properties)?;
    *working.dag_mut() = dag;

    let meta = properties
        .remove::<CircuitMeta>()
        .expect("CircuitMeta was just inserted above");
    // Steps 2-8 never change qubit count, so `working`'s bookkeeping is
    // already consistent with `meta` here.
    for (i, (&ancillary, &garbage)) in meta.ancillary.iter().zip(&meta.garbage).enumerate() {
        working.set_ancillary(QubitId(i as u32), ancillary);
        working.set_garbage(QubitId(i as u32), garbage);
    }
    working.set_initial_layout(meta.initial_layout);
    working.set_output_permutation(meta.output_permutation);

    strip_idle_qubits(&working)
}

/// Runs the full manager preprocessing pipeline (spec §4.H steps 1-10) on
/// both circuits, returning the pair ready for checker construction.
pub fn preprocess_pair(c1: &Circuit, c2: &Circuit, opts: &Optimizations) -> EqCheckResult<(Circuit, Circuit)> {
    let mut p1 = preprocess_one(c1, opts)?;
    let mut p2 = preprocess_one(c2, opts)?;
    align_ancillaries(&mut p1, &mut p2);
    Ok((p1, p2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arvak_ir::QubitId;

    #[test]
    fn test_reconstruct_swaps_collapses_cnot_triple() {
        let mut c = Circuit::with_size("c", 2, 0);
        c.cx(QubitId(0), QubitId(1)).unwrap();
        c.cx(QubitId(1), QubitId(0)).unwrap();
        c.cx(QubitId(0), QubitId(1)).unwrap();
        let mut opts = Optimizations::default();
        // Isolate step 3 from step 7, which would otherwise elide the
        // reconstructed trailing swap into the output permutation.
        opts.elide_permutations = false;
        let out = preprocess_one(&c, &opts).unwrap();
        let names: Vec<&str> = out.dag().topological_ops().map(|(_, i)| i.name()).collect();
        assert_eq!(names, vec!["swap"]);
    }

    #[test]
    fn test_elide_permutations_folds_trailing_swap() {
        let mut c = Circuit::with_size("c", 2, 0);
        c.h(QubitId(0)).unwrap();
        c.swap(QubitId(0), QubitId(1)).unwrap();
        let opts = Optimizations::default();
        let out = preprocess_one(&c, &opts).unwrap();
        let names: Vec<&str> = out.dag().topological_ops().map(|(_, i)| i.name()).collect();
        assert_eq!(names, vec!["h"]);
        assert_eq!(out.output_permutation().get(QubitId(0)), QubitId(1));
        assert_eq!(out.output_permutation().get(QubitId(1)), QubitId(0));
    }

    #[test]
    fn test_strip_idle_qubits_shrinks_circuit() {
        let mut c = Circuit::with_size("c", 3, 0);
        c.h(QubitId(0)).unwrap();
        c.cx(QubitId(0), QubitId(2)).unwrap();
        let opts = Optimizations::default();
        let out = preprocess_one(&c, &opts).unwrap();
        assert_eq!(out.num_qubits(), 2);
    }

    #[test]
    fn test_align_ancillaries_pads_smaller_circuit() {
        let mut c1 = Circuit::with_size("c1", 3, 0);
        c1.h(QubitId(0)).unwrap();
        c1.cx(QubitId(0), QubitId(1)).unwrap();
        c1.cx(QubitId(0), QubitId(2)).unwrap();
        let mut c2 = Circuit::with_size("c2", 1, 0);
        c2.h(QubitId(0)).unwrap();
        let opts = Optimizations::default();
        let (p1, p2) = preprocess_pair(&c1, &c2, &opts).unwrap();
        assert_eq!(p1.num_qubits(), p2.num_qubits());
        assert_eq!(p1.num_qubits(), 3);
    }

    #[test]
    fn test_dynamic_circuit_rejected_when_disabled() {
        use arvak_ir::ClbitId;
        let mut c = Circuit::with_size("c", 1, 1);
        c.h(QubitId(0)).unwrap();
        c.dag_mut()
            .apply(Instruction::measure(QubitId(0), ClbitId(0)))
            .unwrap();
        c.h(QubitId(0)).unwrap();
        let mut opts = Optimizations::default();
        opts.transform_dynamic_circuit = false;
        let result = preprocess_one(&c, &opts);
        assert!(matches!(result, Err(EqCheckError::UnsupportedDynamicCircuit(_))));
    }

    #[test]
    fn test_dynamic_circuit_defers_measurement_when_enabled() {
        use arvak_ir::ClbitId;
        let mut c = Circuit::with_size("c", 1, 1);
        c.h(QubitId(0)).unwrap();
        c.dag_mut()
            .apply(Instruction::measure(QubitId(0), ClbitId(0)))
            .unwrap();
        c.x(QubitId(0)).unwrap();
        let opts = Optimizations::default();
        let out = preprocess_one(&c, &opts).unwrap();
        let kinds: Vec<bool> = out
            .dag()
            .topological_ops()
            .map(|(_, i)| matches!(i.kind, InstructionKind::Measure))
            .collect();
        // remove_final_measurements (step 8, default on) drops the deferred
        // measurement entirely, leaving only the unitary gates.
        assert!(kinds.iter().all(|&is_measure| !is_measure));
    }
}
