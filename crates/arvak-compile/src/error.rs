//! Error types for the compilation crate.

use arvak_ir::IrError;
use thiserror::Error;

/// Errors that can occur while running a compilation pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// A pass produced a circuit that reorders operations across a
    /// measurement boundary.
    #[error("measurement violation in gate '{gate_name}' on qubit {qubit}: {detail}")]
    MeasurementViolation {
        /// Name of the offending gate.
        gate_name: String,
        /// Index of the qubit on which the violation was observed.
        qubit: u32,
        /// Human-readable description of the violation.
        detail: String,
    },

    /// Underlying IR error, propagated as-is.
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
