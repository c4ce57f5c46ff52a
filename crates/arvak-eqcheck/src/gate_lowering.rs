//! Lowering `arvak_ir` instructions into decision-diagram edges.
//!
//! Single-target gates (with zero or more controls) go through
//! [`arvak_dd::Package::make_gate_dd`], reusing `arvak_compile::Unitary2x2`
//! for the base 2x2 matrix. Genuinely multi-qubit gates that don't fit the
//! single-target-plus-controls shape (SWAP, iSWAP, CSWAP, RXX, RYY, RZZ) go
//! through [`arvak_dd::Package::make_dense_gate_dd`] instead.

use arvak_compile::unitary::Unitary2x2;
use arvak_dd::{Edge, Package};
use arvak_ir::{Control, Gate, GateKind, Instruction, InstructionKind, StandardGate};
use num_complex::Complex64;

use crate::error::{EqCheckError, EqCheckResult};

fn param(p: &arvak_ir::ParameterExpression, gate: &str) -> EqCheckResult<f64> {
    p.as_f64().ok_or_else(|| {
        EqCheckError::UnsupportedByChecker {
            checker: "gate_lowering",
            reason: format!("gate '{gate}' has an unbound symbolic parameter"),
        }
    })
}

/// Base (un-lifted) 2x2 matrix for a single-qubit standard gate, ignoring
/// any implicit control qubits the gate's own variant encodes.
fn base_matrix_1q(sg: &StandardGate) -> EqCheckResult<[Complex64; 4]> {
    let u = match sg {
        StandardGate::I => Unitary2x2::identity(),
        StandardGate::X => Unitary2x2::x(),
        StandardGate::Y => Unitary2x2::y(),
        StandardGate::Z => Unitary2x2::z(),
        StandardGate::H | StandardGate::CH => Unitary2x2::h(),
        StandardGate::S => Unitary2x2::s(),
        StandardGate::Sdg => Unitary2x2::sdg(),
        StandardGate::T => Unitary2x2::t(),
        StandardGate::Tdg => Unitary2x2::tdg(),
        StandardGate::SX => Unitary2x2::sx(),
        StandardGate::SXdg => Unitary2x2::sxdg(),
        StandardGate::Rx(p) | StandardGate::CRx(p) => Unitary2x2::rx(param(p, sg.name())?),
        StandardGate::Ry(p) | StandardGate::CRy(p) => Unitary2x2::ry(param(p, sg.name())?),
        StandardGate::Rz(p) | StandardGate::CRz(p) => Unitary2x2::rz(param(p, sg.name())?),
        StandardGate::P(p) | StandardGate::CP(p) => Unitary2x2::p(param(p, sg.name())?),
        StandardGate::U(t, p, l) => {
            Unitary2x2::u(param(t, "u")?, param(p, "u")?, param(l, "u")?)
        }
        StandardGate::CX | StandardGate::CY | StandardGate::CZ => match sg {
            StandardGate::CX => Unitary2x2::x(),
            StandardGate::CY => Unitary2x2::y(),
            _ => Unitary2x2::z(),
        },
        StandardGate::PRX(theta, phi) => {
            let theta = param(theta, "prx")?;
            let phi = param(phi, "prx")?;
            Unitary2x2::rz(phi)
                .mul(&Unitary2x2::rx(theta))
                .mul(&Unitary2x2::rz(-phi))
        }
        other => {
            return Err(EqCheckError::UnsupportedByChecker {
                checker: "gate_lowering",
                reason: format!("'{}' is not a single-target gate", other.name()),
            });
        }
    };
    Ok(u.data)
}

/// Full dense unitary matrix (row-major, `2^k x 2^k`) for a genuinely
/// multi-qubit standard gate with no single-target-plus-controls shape.
fn dense_matrix(sg: &StandardGate) -> EqCheckResult<Vec<Complex64>> {
    let zero = Complex64::new(0.0, 0.0);
    let one = Complex64::new(1.0, 0.0);
    let i = Complex64::new(0.0, 1.0);
    match sg {
        StandardGate::Swap => Ok(vec![
            one, zero, zero, zero, //
            zero, zero, one, zero, //
            zero, one, zero, zero, //
            zero, zero, zero, one,
        ]),
        StandardGate::ISwap => Ok(vec![
            one, zero, zero, zero, //
            zero, zero, i, zero, //
            zero, i, zero, zero, //
            zero, zero, zero, one,
        ]),
        StandardGate::CSwap => {
            let mut m = vec![zero; 64];
            let ident_rows = [0usize, 1, 2, 3, 6, 7];
            for r in ident_rows {
                m[r * 8 + r] = one;
            }
            m[4 * 8 + 5] = one;
            m[5 * 8 + 4] = one;
            Ok(m)
        }
        StandardGate::RXX(p) => {
            let theta = param(p, "rxx")?;
            let c = Complex64::new((theta / 2.0).cos(), 0.0);
            let s = Complex64::new(0.0, -(theta / 2.0).sin());
            Ok(vec![
                c, zero, zero, s, //
                zero, c, s, zero, //
                zero, s, c, zero, //
                s, zero, zero, c,
            ])
        }
        StandardGate::RYY(p) => {
            let theta = param(p, "ryy")?;
            let c = Complex64::new((theta / 2.0).cos(), 0.0);
            let s = Complex64::new(0.0, (theta / 2.0).sin());
            Ok(vec![
                c, zero, zero, s, //
                zero, c, -s, zero, //
                zero, -s, c, zero, //
                s, zero, zero, c,
            ])
        }
        StandardGate::RZZ(p) => {
            let theta = param(p, "rzz")?;
            let pos = Complex64::from_polar(1.0, theta / 2.0);
            let neg = Complex64::from_polar(1.0, -theta / 2.0);
            Ok(vec![
                neg, zero, zero, zero, //
                zero, pos, zero, zero, //
                zero, zero, pos, zero, //
                zero, zero, zero, neg,
            ])
        }
        other => Err(EqCheckError::UnsupportedByChecker {
            checker: "gate_lowering",
            reason: format!("'{}' has no dense-matrix lowering", other.name()),
        }),
    }
}

fn to_dd_controls(controls: &[Control]) -> Vec<(u32, bool)> {
    controls.iter().map(|c| (c.qubit.0, c.positive)).collect()
}

/// Lower a custom gate's (optional) explicit matrix onto `qubits`.
fn lower_custom(
    pkg: &mut Package,
    n_qubits: u32,
    qubits: &[u32],
    gate: &GateKind,
) -> EqCheckResult<Edge> {
    let GateKind::Custom(cg) = gate else {
        unreachable!("lower_custom called on a standard gate")
    };
    let matrix = cg.matrix.as_ref().ok_or_else(|| EqCheckError::UnsupportedByChecker {
        checker: "gate_lowering",
        reason: format!("custom gate '{}' carries no unitary matrix", cg.name),
    })?;
    if qubits.len() == 1 {
        let m: [Complex64; 4] = matrix.clone().try_into().map_err(|_| {
            EqCheckError::Internal(format!("custom gate '{}' matrix has wrong size", cg.name))
        })?;
        Ok(pkg.make_gate_dd(m, n_qubits, qubits[0], &[]))
    } else {
        Ok(pkg.make_dense_gate_dd(n_qubits, qubits, matrix))
    }
}

/// Standard gate variants whose semantics genuinely span more than one
/// target with no implicit control qubit.
fn is_dense_only(sg: &StandardGate) -> bool {
    matches!(
        sg,
        StandardGate::Swap
            | StandardGate::ISwap
            | StandardGate::CSwap
            | StandardGate::RXX(_)
            | StandardGate::RYY(_)
            | StandardGate::RZZ(_)
    )
}

/// Lower one unitary instruction into a gate decision diagram on `n_qubits`
/// qubits, honoring its controls. Qubit indices are taken as DD levels
/// directly; callers apply the live permutation beforehand.
pub fn lower_gate(pkg: &mut Package, n_qubits: u32, instruction: &Instruction) -> EqCheckResult<Edge> {
    match &instruction.kind {
        InstructionKind::Barrier => Ok(pkg.make_ident(n_qubits)),
        InstructionKind::Gate(g @ Gate {
            kind: GateKind::Custom(_),
            ..
        }) => {
            let qubits: Vec<u32> = instruction.qubits.iter().map(|q| q.0).collect();
            lower_custom(pkg, n_qubits, &qubits, &g.kind)
        }
        InstructionKind::Gate(Gate {
            kind: GateKind::Standard(sg),
            ..
        }) => {
            if is_dense_only(sg) {
                let matrix = dense_matrix(sg)?;
                let qubits: Vec<u32> = instruction.target_qubits().iter().map(|q| q.0).collect();
                Ok(pkg.make_dense_gate_dd(n_qubits, &qubits, &matrix))
            } else {
                let matrix = base_matrix_1q(sg)?;
                let target = instruction
                    .target_qubits()
                    .first()
                    .ok_or_else(|| EqCheckError::Internal(format!("gate '{}' has no target", sg.name())))?
                    .0;
                let controls = to_dd_controls(&instruction.control_qubits());
                Ok(pkg.make_gate_dd(matrix, n_qubits, target, &controls))
            }
        }
        other => Err(EqCheckError::UnsupportedByChecker {
            checker: "gate_lowering",
            reason: format!("instruction '{}' is not a unitary gate", other_name(other)),
        }),
    }
}

fn other_name(kind: &InstructionKind) -> &'static str {
    match kind {
        InstructionKind::Measure => "measure",
        InstructionKind::Reset => "reset",
        InstructionKind::Delay { .. } => "delay",
        InstructionKind::Shuttle { .. } => "shuttle",
        InstructionKind::NoiseChannel { .. } => "noise_channel",
        InstructionKind::Barrier | InstructionKind::Gate(_) => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arvak_ir::QubitId;

    #[test]
    fn test_lowers_single_qubit_hadamard() {
        let mut pkg = Package::new(2e-13);
        let inst = Instruction::single_qubit_gate(StandardGate::H, QubitId(0));
        let edge = lower_gate(&mut pkg, 1, &inst).unwrap();
        let hh = pkg.multiply(edge, edge);
        assert!(pkg.is_close_to_identity(hh, 1e-9));
    }

    #[test]
    fn test_lowers_cx_with_implicit_control() {
        let mut pkg = Package::new(2e-13);
        let inst = Instruction::two_qubit_gate(StandardGate::CX, QubitId(0), QubitId(1));
        let edge = lower_gate(&mut pkg, 2, &inst).unwrap();
        let squared = pkg.multiply(edge, edge);
        assert!(pkg.is_close_to_identity(squared, 1e-9));
    }

    #[test]
    fn test_lowers_swap_as_dense_matrix() {
        let mut pkg = Package::new(2e-13);
        let inst = Instruction::two_qubit_gate(StandardGate::Swap, QubitId(0), QubitId(1));
        let edge = lower_gate(&mut pkg, 2, &inst).unwrap();
        let squared = pkg.multiply(edge, edge);
        assert!(pkg.is_close_to_identity(squared, 1e-9));
    }
}
