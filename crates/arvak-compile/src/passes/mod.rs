//! Built-in compilation passes.
//!
//! Every pass here is target-agnostic: it operates purely on DAG structure
//! (and, where noted, on `PropertySet` side-channel metadata) without
//! consulting hardware properties. Hardware-mapping passes (layout, routing,
//! basis translation) are out of scope for an equivalence-checking crate.

pub mod agnostic;

pub use agnostic::{
    CancelCX, CommutativeCancellation, MeasurementBarrierVerification, OneQubitBasis,
    Optimize1qGates, VerificationResult,
};
