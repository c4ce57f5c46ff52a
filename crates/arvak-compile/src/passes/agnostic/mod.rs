//! Target-agnostic compilation passes.
//!
//! These passes operate purely on the DAG structure. They are safe to run
//! on any circuit regardless of target hardware, which is all that matters
//! for the preprocessing pipeline in `arvak-eqcheck`.

pub mod optimization;
pub mod verification;

pub use optimization::{CancelCX, CommutativeCancellation, OneQubitBasis, Optimize1qGates};
pub use verification::{MeasurementBarrierVerification, VerificationResult};
