//! Arvak Compilation Framework
//!
//! This crate provides the pass-based infrastructure used to normalize a
//! circuit before equivalence checking: single-qubit fusion, gate
//! cancellation, and the measurement-boundary safety net that runs after
//! them. It implements a pass architecture similar to LLVM's, kept small and
//! generic so `arvak-eqcheck`'s preprocessing pipeline (dynamic-circuit
//! elimination, SWAP reconstruction, operation reordering, and friends) can
//! be built out of the same [`Pass`] trait.
//!
//! # Architecture
//!
//! ```text
//! Input Circuit
//!       │
//!       ▼
//! ┌─────────────┐
//! │ PassManager │ ◄── PropertySet (custom per-pass metadata)
//! └─────────────┘
//!       │
//!       ├── Optimize1qGates
//!       ├── CancelCX / CommutativeCancellation
//!       └── MeasurementBarrierVerification
//!       │
//!       ▼
//! Output Circuit
//! ```
//!
//! # Example: Basic Compilation
//!
//! ```rust
//! use arvak_compile::PassManagerBuilder;
//! use arvak_ir::Circuit;
//!
//! // Create a circuit
//! let circuit = Circuit::bell().unwrap();
//!
//! let (pm, mut props) = PassManagerBuilder::new()
//!     .with_optimization_level(2)
//!     .build();
//!
//! // Compile the circuit
//! let mut dag = circuit.into_dag();
//! pm.run(&mut dag, &mut props).unwrap();
//!
//! let compiled = Circuit::from_dag(dag);
//! println!("Compiled depth: {}", compiled.depth());
//! ```
//!
//! # Optimization Levels
//!
//! | Level | Passes Included |
//! |-------|-----------------|
//! | 0 | None |
//! | 1 | 1q gate fusion + measurement barrier verification |
//! | 2 | + CX cancellation |
//! | 3 | + Commutative cancellation |
//!
//! # Built-in Passes
//!
//! ## Optimization Passes
//! - [`passes::Optimize1qGates`]: Merge consecutive 1-qubit gates via ZYZ decomposition
//! - [`passes::CancelCX`]: Cancel adjacent CX·CX pairs
//! - [`passes::CommutativeCancellation`]: Merge commuting rotation gates
//!
//! ## Verification Passes
//! - [`passes::MeasurementBarrierVerification`]: Confirms optimization did not
//!   reorder operations across a measurement boundary
//!
//! # Custom Passes
//!
//! Implement the [`Pass`] trait to create custom compilation passes:
//!
//! ```rust
//! use arvak_compile::{Pass, PassKind, CompileResult, PropertySet};
//! use arvak_ir::CircuitDag;
//!
//! struct MyCustomPass;
//!
//! impl Pass for MyCustomPass {
//!     fn name(&self) -> &str { "my_custom_pass" }
//!     fn kind(&self) -> PassKind { PassKind::Transformation }
//!
//!     fn run(&self, dag: &mut CircuitDag, props: &mut PropertySet) -> CompileResult<()> {
//!         // Your pass logic here
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
pub mod manager;
pub mod pass;
pub mod property;
pub mod unitary;

// Built-in passes
pub mod passes;

pub use error::{CompileError, CompileResult};
pub use manager::{PassManager, PassManagerBuilder};
pub use pass::{AnalysisPass, Pass, PassKind, TransformationPass};
pub use property::PropertySet;
