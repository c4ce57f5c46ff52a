//! Circuit instructions combining gates with operands.

use serde::{Deserialize, Serialize};

use crate::gate::{Gate, GateKind, StandardGate};
use crate::noise::{NoiseModel, NoiseRole};
use crate::qubit::{ClbitId, QubitId};

/// A control qubit with a polarity.
///
/// A positive control fires the gated operation when the control qubit is
/// `|1⟩`; a negative (open) control fires it when the control qubit is `|0⟩`.
/// Standard gates such as [`StandardGate::CX`] encode their single positive
/// control implicitly via operand order; this type exists for generalized,
/// possibly negative, possibly multi-qubit control sets (e.g. `mcx`) that a
/// fixed enum variant cannot express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Control {
    /// The controlling qubit.
    pub qubit: QubitId,
    /// `true` for a positive (closed) control, `false` for a negative (open) control.
    pub positive: bool,
}

impl Control {
    /// Create a positive control on `qubit`.
    pub fn positive(qubit: QubitId) -> Self {
        Self {
            qubit,
            positive: true,
        }
    }

    /// Create a negative (open) control on `qubit`.
    pub fn negative(qubit: QubitId) -> Self {
        Self {
            qubit,
            positive: false,
        }
    }
}

/// The kind of instruction in a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A quantum gate operation.
    Gate(Gate),
    /// Measurement operation.
    Measure,
    /// Reset qubit to |0‚ü©.
    Reset,
    /// Barrier (synchronization point).
    Barrier,
    /// Delay instruction.
    Delay {
        /// Duration in device-specific units.
        duration: u64,
    },
    /// Shuttle qubit between zones (neutral-atom architectures).
    Shuttle {
        /// Source zone index.
        from_zone: u32,
        /// Destination zone index.
        to_zone: u32,
    },
    /// Noise channel operation.
    ///
    /// Represents a non-unitary noise process applied to a qubit.
    /// The [`NoiseRole`] determines whether the compiler may optimize
    /// around this channel (`Deficit`) or must preserve it (`Resource`).
    NoiseChannel {
        /// The noise model describing the physical process.
        model: NoiseModel,
        /// Semantic role: deficit (mitigate) or resource (preserve).
        role: NoiseRole,
    },
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits this instruction operates on. For gate instructions this is
    /// the full operand list (controls implicit in the gate kind, then
    /// controls listed explicitly in `controls`, then targets).
    pub qubits: Vec<QubitId>,
    /// Classical bits this instruction operates on (for measure).
    pub clbits: Vec<ClbitId>,
    /// Explicit, polarity-tagged controls beyond those implied by the gate
    /// kind's own fixed arity (e.g. additional controls for a synthesized
    /// multi-controlled-X). Empty for plain standard gates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Control>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn gate(gate: impl Into<Gate>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate.into()),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
            controls: vec![],
        }
    }

    /// Create a generalized multi-controlled gate instruction.
    ///
    /// `qubits` lists the control qubits followed by the target(s); `controls`
    /// records the polarity of each control qubit (defaulting to positive for
    /// any control not listed).
    pub fn controlled_gate(
        gate: impl Into<Gate>,
        qubits: impl IntoIterator<Item = QubitId>,
        controls: impl IntoIterator<Item = Control>,
    ) -> Self {
        let mut inst = Self::gate(gate, qubits);
        inst.controls = controls.into_iter().collect();
        inst
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a measurement instruction.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
            controls: vec![],
        }
    }

    /// Create a multi-qubit measurement instruction.
    ///
    /// Returns an error if the number of qubits and classical bits do not match.
    pub fn measure_all(
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> crate::error::IrResult<Self> {
        let qubits: Vec<_> = qubits.into_iter().collect();
        let clbits: Vec<_> = clbits.into_iter().collect();
        if qubits.len() != clbits.len() {
            return Err(crate::error::IrError::InvalidDag(format!(
                "measure_all: qubit count ({}) does not match clbit count ({})",
                qubits.len(),
                clbits.len(),
            )));
        }
        Ok(Self {
            kind: InstructionKind::Measure,
            qubits,
            clbits,
            controls: vec![],
        })
    }

    /// Create a reset instruction.
    pub fn reset(qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::Reset,
            qubits: vec![qubit],
            clbits: vec![],
            controls: vec![],
        }
    }

    /// Create a barrier instruction.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
            controls: vec![],
        }
    }

    /// Create a delay instruction.
    pub fn delay(qubit: QubitId, duration: u64) -> Self {
        Self {
            kind: InstructionKind::Delay { duration },
            qubits: vec![qubit],
            clbits: vec![],
            controls: vec![],
        }
    }

    /// Create a shuttle instruction (neutral-atom: move qubit between zones).
    pub fn shuttle(qubit: QubitId, from_zone: u32, to_zone: u32) -> Self {
        Self {
            kind: InstructionKind::Shuttle { from_zone, to_zone },
            qubits: vec![qubit],
            clbits: vec![],
            controls: vec![],
        }
    }

    /// Create a noise channel instruction.
    pub fn noise_channel(model: NoiseModel, role: NoiseRole, qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::NoiseChannel { model, role },
            qubits: vec![qubit],
            clbits: vec![],
            controls: vec![],
        }
    }

    /// Create a deficit noise channel (hardware noise to mitigate).
    pub fn channel_noise(model: NoiseModel, qubit: QubitId) -> Self {
        Self::noise_channel(model, NoiseRole::Deficit, qubit)
    }

    /// Create a resource noise channel (protocol noise to preserve).
    pub fn channel_resource(model: NoiseModel, qubit: QubitId) -> Self {
        Self::noise_channel(model, NoiseRole::Resource, qubit)
    }

    /// Check if this is a noise channel instruction.
    pub fn is_noise_channel(&self) -> bool {
        matches!(self.kind, InstructionKind::NoiseChannel { .. })
    }

    /// Check if this is a resource noise channel (must be preserved).
    pub fn is_noise_resource(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::NoiseChannel {
                role: NoiseRole::Resource,
                ..
            }
        )
    }

    /// Check if this is a shuttle instruction.
    pub fn is_shuttle(&self) -> bool {
        matches!(self.kind, InstructionKind::Shuttle { .. })
    }

    /// Check if this is a gate instruction.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    /// Check if this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this is a reset.
    pub fn is_reset(&self) -> bool {
        matches!(self.kind, InstructionKind::Reset)
    }

    /// Check if this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// Get the gate if this is a gate instruction.
    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    /// Get mutable reference to the gate.
    pub fn gate_mut(&mut self) -> Option<&mut Gate> {
        match &mut self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    /// Whether this instruction represents a unitary operation.
    ///
    /// Gates and barriers are unitary (barriers are identity); measurement,
    /// reset, delay, shuttle, and noise channels are not.
    pub fn is_unitary(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::Gate(_) | InstructionKind::Barrier
        )
    }

    /// The explicit control qubits plus their polarity.
    ///
    /// For standard controlled gates (`CX`, `CCX`, ...) the leading operands
    /// implied by the gate's own arity are all positive controls; `controls`
    /// supplements these for generalized multi-controlled constructions.
    pub fn control_qubits(&self) -> Vec<Control> {
        let implicit = self.implicit_control_count();
        let mut out: Vec<Control> = self.qubits[..implicit]
            .iter()
            .map(|&q| Control::positive(q))
            .collect();
        out.extend(self.controls.iter().copied());
        out
    }

    /// The target qubits (operands that are not implicit controls).
    pub fn target_qubits(&self) -> &[QubitId] {
        &self.qubits[self.implicit_control_count()..]
    }

    fn implicit_control_count(&self) -> usize {
        match &self.kind {
            InstructionKind::Gate(g) => match &g.kind {
                GateKind::Standard(sg) => match sg {
                    StandardGate::CX
                    | StandardGate::CY
                    | StandardGate::CZ
                    | StandardGate::CH
                    | StandardGate::CRx(_)
                    | StandardGate::CRy(_)
                    | StandardGate::CRz(_)
                    | StandardGate::CP(_) => 1,
                    StandardGate::CCX | StandardGate::CSwap => {
                        if matches!(sg, StandardGate::CCX) {
                            2
                        } else {
                            1
                        }
                    }
                    _ => 0,
                },
                GateKind::Custom(_) => 0,
            },
            _ => 0,
        }
    }

    /// Return the inverse of this instruction, if it is unitary.
    ///
    /// Self-inverse gates (Pauli, H, SWAP, CX, ...) return themselves;
    /// rotation gates negate their angle; `U` swaps and negates its
    /// `phi`/`lambda` angles; barriers are their own inverse.
    pub fn invert(&self) -> Option<Self> {
        match &self.kind {
            InstructionKind::Barrier => Some(self.clone()),
            InstructionKind::Gate(g) => {
                let inverted = g.inverse()?;
                Some(Self {
                    kind: InstructionKind::Gate(inverted),
                    qubits: self.qubits.clone(),
                    clbits: self.clbits.clone(),
                    controls: self.controls.clone(),
                })
            }
            _ => None,
        }
    }

    /// Get the name of the instruction.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Reset => "reset",
            InstructionKind::Barrier => "barrier",
            InstructionKind::Delay { .. } => "delay",
            InstructionKind::Shuttle { .. } => "shuttle",
            InstructionKind::NoiseChannel { role, .. } => match role {
                NoiseRole::Deficit => "noise_deficit",
                NoiseRole::Resource => "noise_resource",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_instruction() {
        let inst = Instruction::single_qubit_gate(StandardGate::H, QubitId(0));
        assert!(inst.is_gate());
        assert_eq!(inst.qubits.len(), 1);
        assert_eq!(inst.name(), "h");
    }

    #[test]
    fn test_invert_self_inverse() {
        let h = Instruction::single_qubit_gate(StandardGate::H, QubitId(0));
        assert_eq!(h.invert().unwrap(), h);

        let cx = Instruction::two_qubit_gate(StandardGate::CX, QubitId(0), QubitId(1));
        assert_eq!(cx.invert().unwrap(), cx);
    }

    #[test]
    fn test_invert_rotation_negates_angle() {
        use crate::parameter::ParameterExpression;

        let rx = Instruction::single_qubit_gate(
            StandardGate::Rx(ParameterExpression::constant(1.25)),
            QubitId(0),
        );
        let inv = rx.invert().unwrap();
        match inv.as_gate().unwrap().kind.clone() {
            crate::gate::GateKind::Standard(StandardGate::Rx(p)) => {
                assert_eq!(p.as_f64(), Some(-1.25));
            }
            other => panic!("expected Rx, got {other:?}"),
        }
    }

    #[test]
    fn test_control_qubits_implicit_and_explicit() {
        let cx = Instruction::two_qubit_gate(StandardGate::CX, QubitId(0), QubitId(1));
        assert_eq!(cx.control_qubits(), vec![Control::positive(QubitId(0))]);
        assert_eq!(cx.target_qubits(), &[QubitId(1)]);

        let ccx = Instruction::gate(StandardGate::CCX, [QubitId(0), QubitId(1), QubitId(2)]);
        assert_eq!(
            ccx.control_qubits(),
            vec![Control::positive(QubitId(0)), Control::positive(QubitId(1))]
        );
        assert_eq!(ccx.target_qubits(), &[QubitId(2)]);

        let mut mcx = Instruction::gate(StandardGate::X, [QubitId(2)]);
        mcx.controls = vec![Control::positive(QubitId(0)), Control::negative(QubitId(1))];
        assert_eq!(mcx.control_qubits(), mcx.controls);
    }

    #[test]
    fn test_measure_instruction() {
        let inst = Instruction::measure(QubitId(0), ClbitId(0));
        assert!(inst.is_measure());
        assert_eq!(inst.qubits.len(), 1);
        assert_eq!(inst.clbits.len(), 1);
    }

    #[test]
    fn test_barrier_instruction() {
        let inst = Instruction::barrier([QubitId(0), QubitId(1), QubitId(2)]);
        assert!(inst.is_barrier());
        assert_eq!(inst.qubits.len(), 3);
    }

    #[test]
    fn test_noise_channel_instruction() {
        use crate::noise::NoiseModel;

        let inst = Instruction::channel_resource(NoiseModel::Depolarizing { p: 0.03 }, QubitId(0));
        assert!(inst.is_noise_channel());
        assert!(inst.is_noise_resource());
        assert_eq!(inst.name(), "noise_resource");
        assert_eq!(inst.qubits.len(), 1);

        let deficit =
            Instruction::channel_noise(NoiseModel::AmplitudeDamping { gamma: 0.01 }, QubitId(1));
        assert!(deficit.is_noise_channel());
        assert!(!deficit.is_noise_resource());
        assert_eq!(deficit.name(), "noise_deficit");
    }

    #[test]
    fn test_shuttle_instruction() {
        let inst = Instruction::shuttle(QubitId(0), 0, 1);
        assert!(inst.is_shuttle());
        assert_eq!(inst.name(), "shuttle");
        assert_eq!(inst.qubits.len(), 1);
        match inst.kind {
            InstructionKind::Shuttle { from_zone, to_zone } => {
                assert_eq!(from_zone, 0);
                assert_eq!(to_zone, 1);
            }
            _ => panic!("Expected Shuttle"),
        }
    }
}
