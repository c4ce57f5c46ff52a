//! Error types for equivalence checking.

use arvak_compile::CompileError;
use arvak_ir::IrError;
use thiserror::Error;

/// Errors that can occur while configuring or running equivalence checking.
///
/// Mirrors the taxonomy of spec §7. `UsageError`, `UnsupportedDynamicCircuit`,
/// and `QubitCountMismatch` fail construction of the manager.
/// `UnsupportedByChecker` is usually recovered from (the manager falls back
/// to the Construction checker); `Timeout` and cancellation are folded into
/// `NoInformation` rather than surfaced as an error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EqCheckError {
    /// Malformed configuration, e.g. Lookahead selected with the construction checker.
    #[error("usage error: {0}")]
    UsageError(String),

    /// A non-unitary primitive remains after preprocessing and
    /// `transform_dynamic_circuit` is disabled.
    #[error("unsupported dynamic circuit: {0}")]
    UnsupportedDynamicCircuit(String),

    /// A checker cannot handle the given pair of circuits.
    #[error("checker '{checker}' cannot handle this circuit pair: {reason}")]
    UnsupportedByChecker {
        /// Name of the checker that declined.
        checker: &'static str,
        /// Why it declined.
        reason: String,
    },

    /// The circuits' non-ancillary qubit counts differ after alignment.
    #[error("qubit count mismatch after alignment: {lhs} vs {rhs}")]
    QubitCountMismatch {
        /// Non-ancillary qubit count of the first circuit.
        lhs: usize,
        /// Non-ancillary qubit count of the second circuit.
        rhs: usize,
    },

    /// The configured wall-clock timeout elapsed before a verdict was reached.
    #[error("equivalence check timed out")]
    Timeout,

    /// An internal invariant was broken (DD allocator exhaustion, broken
    /// bookkeeping). Halts the process in debug; surfaced as `NoInformation`
    /// by the manager in release.
    #[error("internal error: {0}")]
    Internal(String),

    /// Propagated from the IR layer.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Propagated from the compilation/preprocessing layer.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Result type for equivalence-checking operations.
pub type EqCheckResult<T> = Result<T, EqCheckError>;
