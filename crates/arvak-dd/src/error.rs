//! Error types for the decision-diagram package.

use thiserror::Error;

/// Errors that can occur inside the DD package.
///
/// Per spec.md §4.A, allocation failure and unique-table overflow are fatal
/// (`Internal`); every comparison-style operation otherwise resolves to an
/// `EquivalenceCriterion` rather than an error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DdError {
    /// The node arena has reached its configured capacity.
    #[error("decision-diagram node pool exhausted (capacity {capacity})")]
    NodePoolExhausted {
        /// Capacity that was exceeded.
        capacity: usize,
    },

    /// An operation was applied to a DD with the wrong shape (vector where a
    /// matrix was required, or vice versa).
    #[error("operation '{op}' requires a {expected} decision diagram")]
    ShapeMismatch {
        /// Name of the operation that failed.
        op: &'static str,
        /// The shape that was required.
        expected: &'static str,
    },

    /// Two operands span a different number of qubits.
    #[error("qubit count mismatch: {lhs} vs {rhs}")]
    QubitCountMismatch {
        /// Number of qubits in the left operand.
        lhs: u32,
        /// Number of qubits in the right operand.
        rhs: u32,
    },
}

/// Result type for DD package operations.
pub type DdResult<T> = Result<T, DdError>;
