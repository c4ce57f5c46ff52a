//! Tracks one circuit's progression through an equivalence check (spec §4.B).
//!
//! A `TaskManager` owns a flattened, topologically-sorted copy of its
//! circuit's operations (preprocessing has already produced an immutable,
//! ready-to-consume sequence — see `arvak-ir::dag::CircuitDag::topological_ops`)
//! plus the bookkeeping needed to apply them: an iterator position, the live
//! permutation, and which side (`Direction`) new gates are multiplied onto.
//!
//! Unlike the original C++ task manager, this one does not also own "the
//! internal DD edge": `arvak_dd::Edge` is `Copy`, so checkers hold their own
//! edge(s) and pass them by value into [`TaskManager::advance`] and friends.
//! This lets the Alternating checker drive two task managers against a
//! single shared matrix DD `F` without fighting the borrow checker over who
//! owns the state.

use arvak_dd::{Direction, Edge, Package};
use arvak_ir::{Circuit, Control, Instruction, Permutation, QubitId};

use crate::error::{EqCheckError, EqCheckResult};
use crate::gate_lowering::lower_gate;

/// Progression state for one circuit in a check.
#[derive(Debug, Clone)]
pub struct TaskManager {
    ops: Vec<Instruction>,
    position: usize,
    permutation: Permutation,
    initial_layout: Permutation,
    output_permutation: Permutation,
    ancillary: Vec<bool>,
    garbage: Vec<bool>,
    direction: Direction,
    n_qubits: u32,
}

impl TaskManager {
    /// Build a task manager from a (already preprocessed) circuit.
    pub fn new(circuit: &Circuit, direction: Direction) -> Self {
        let ops: Vec<Instruction> = circuit
            .dag()
            .topological_ops()
            .map(|(_, inst)| inst.clone())
            .filter(|inst| inst.is_unitary())
            .collect();
        Self {
            ops,
            position: 0,
            permutation: circuit.initial_layout().clone(),
            initial_layout: circuit.initial_layout().clone(),
            output_permutation: circuit.output_permutation().clone(),
            ancillary: circuit.ancillary().to_vec(),
            garbage: circuit.garbage().to_vec(),
            direction,
            n_qubits: circuit.num_qubits() as u32,
        }
    }

    /// Whether every operation has been consumed.
    pub fn finished(&self) -> bool {
        self.position >= self.ops.len()
    }

    /// Number of operations remaining.
    pub fn remaining(&self) -> usize {
        self.ops.len() - self.position
    }

    /// The next unconsumed operation, if any (qubits not yet permutation-mapped).
    pub fn peek(&self) -> Option<&Instruction> {
        self.ops.get(self.position)
    }

    /// The circuit's initial layout (unchanged by `advance`).
    pub fn initial_layout(&self) -> &Permutation {
        &self.initial_layout
    }

    /// The circuit's declared output permutation.
    pub fn output_permutation(&self) -> &Permutation {
        &self.output_permutation
    }

    /// The live permutation (initial layout composed with any SWAPs applied so far).
    pub fn live_permutation(&self) -> &Permutation {
        &self.permutation
    }

    /// The ancillary-qubit mask.
    pub fn ancillary(&self) -> &[bool] {
        &self.ancillary
    }

    /// The garbage-qubit mask.
    pub fn garbage(&self) -> &[bool] {
        &self.garbage
    }

    fn remap(&self, inst: &Instruction) -> Instruction {
        let mut out = inst.clone();
        for q in &mut out.qubits {
            *q = self.permutation.get(*q);
        }
        for c in &mut out.controls {
            *c = Control {
                qubit: self.permutation.get(c.qubit),
                positive: c.positive,
            };
        }
        out
    }

    /// Fast-forward over a leading run of (uncontrolled) SWAP gates by
    /// folding them into the live permutation instead of multiplying a gate
    /// DD, mirroring the original's `apply_swap_operations`.
    pub fn apply_swap_operations(&mut self) {
        while let Some(inst) = self.peek() {
            let is_plain_swap = matches!(
                &inst.kind,
                arvak_ir::InstructionKind::Gate(g)
                    if matches!(&g.kind, arvak_ir::GateKind::Standard(arvak_ir::StandardGate::Swap))
                        && inst.controls.is_empty()
            );
            if !is_plain_swap {
                break;
            }
            let (a, b) = (inst.qubits[0], inst.qubits[1]);
            let (pa, pb) = (self.permutation.get(a), self.permutation.get(b));
            self.permutation.set(a, pb);
            self.permutation.set(b, pa);
            self.position += 1;
        }
    }

    /// Apply the next `n` operations, honoring the live permutation and this
    /// task's side, into `state`. Forward application multiplies from the
    /// left; a `Right`-direction task multiplies the gate's inverse from the
    /// right (used by the Alternating checker for circuit 2).
    pub fn advance(&mut self, pkg: &mut Package, state: Edge, n: usize) -> EqCheckResult<Edge> {
        let mut state = state;
        for _ in 0..n {
            let Some(inst) = self.peek().cloned() else {
                break;
            };
            let mapped = self.remap(&inst);
            let gate_edge = if self.direction == Direction::Right {
                let fwd = lower_gate(pkg, self.n_qubits, &mapped)?;
                pkg.conjugate_transpose(fwd)
            } else {
                lower_gate(pkg, self.n_qubits, &mapped)?
            };
            let new_state = match self.direction {
                Direction::Left => pkg.multiply(gate_edge, state),
                Direction::Right => pkg.multiply(state, gate_edge),
            };
            pkg.inc_ref(new_state);
            pkg.dec_ref(state);
            state = new_state;
            self.position += 1;
            pkg.garbage_collect(false);
        }
        Ok(state)
    }

    /// Conjugate `state` by the permutation difference between the live
    /// permutation and the circuit's declared output permutation.
    pub fn change_permutation(&self, pkg: &mut Package, state: Edge) -> Edge {
        pkg.change_permutation(
            state,
            self.n_qubits,
            &self.permutation,
            &self.output_permutation,
            self.direction,
        )
    }

    /// Project ancillary qubits onto |0> from this task's side.
    pub fn reduce_ancillae(&self, pkg: &mut Package, state: Edge) -> Edge {
        pkg.reduce_ancillae(state, &self.ancillary, self.direction)
    }

    /// Sum out garbage-qubit contributions.
    pub fn reduce_garbage(&self, pkg: &mut Package, state: Edge, both_sides: bool) -> Edge {
        pkg.reduce_garbage(state, &self.garbage, both_sides)
    }

    /// Whether any non-idle ancillary qubit's "aliveness" would disagree with
    /// `other`'s — used by the Alternating checker's `can_handle` eligibility
    /// check (spec §4.E).
    pub fn ancilla_aliveness_agrees(&self, other: &TaskManager) -> bool {
        self.ancillary.len() == other.ancillary.len()
            && self
                .ancillary
                .iter()
                .zip(&other.ancillary)
                .all(|(a, b)| a == b)
    }

    /// Validate that `n` matches this task's qubit count (used before
    /// constructing a shared identity DD spanning both circuits).
    pub fn check_qubit_count(&self, n: u32) -> EqCheckResult<()> {
        if self.n_qubits != n {
            return Err(EqCheckError::QubitCountMismatch {
                lhs: self.n_qubits as usize,
                rhs: n as usize,
            });
        }
        Ok(())
    }

    /// Number of qubits this task's circuit spans.
    pub fn n_qubits(&self) -> u32 {
        self.n_qubits
    }
}

/// Whether `a` and `b`'s next head operations are syntactically identical
/// after permutation mapping — same type, same control/target sets, same
/// parameters — used by the Alternating checker's matched-pair shortcut
/// (spec §4.E step 2).
pub fn heads_match(a: &TaskManager, b: &TaskManager) -> bool {
    let (Some(ia), Some(ib)) = (a.peek(), b.peek()) else {
        return false;
    };
    if ia.name() != ib.name() || ia.qubits.len() != ib.qubits.len() {
        return false;
    }
    let map = |task: &TaskManager, q: QubitId| task.permutation.get(q);
    let qa: Vec<_> = ia.qubits.iter().map(|&q| map(a, q)).collect();
    let qb: Vec<_> = ib.qubits.iter().map(|&q| map(b, q)).collect();
    if qa != qb {
        return false;
    }
    let ca: Vec<_> = ia
        .control_qubits()
        .into_iter()
        .map(|c| (map(a, c.qubit), c.positive))
        .collect();
    let cb: Vec<_> = ib
        .control_qubits()
        .into_iter()
        .map(|c| (map(b, c.qubit), c.positive))
        .collect();
    ca == cb
}

#[cfg(test)]
mod tests {
    use super::*;
    use arvak_ir::QubitId as Q;

    #[test]
    fn test_bell_pair_task_advances_to_completion() {
        let circuit = Circuit::bell().unwrap();
        let mut task = TaskManager::new(&circuit, Direction::Left);
        let mut pkg = Package::new(2e-13);
        let mut state = pkg.make_ident(2);
        pkg.inc_ref(state);
        while !task.finished() {
            task.apply_swap_operations();
            if task.finished() {
                break;
            }
            state = task.advance(&mut pkg, state, 1).unwrap();
        }
        assert_eq!(task.remaining(), 0);
        let _ = Q(0);
    }
}
