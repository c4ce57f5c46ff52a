//! Decision-diagram and ZX-calculus based quantum circuit equivalence
//! checking.
//!
//! `arvak-eqcheck` is the top of the `arvak-*` stack: it preprocesses a pair
//! of circuits (`preprocess`, spec §4.H steps 1-10) through the same
//! `arvak_compile::Pass`/`PassManager` machinery the compiler uses for its
//! own optimizations, tracks each circuit's progression through a check
//! (`task_manager`), picks how fast to advance each side per step
//! (`application_scheme`), and runs up to four independent checkers
//! (`checkers`) — Construction, Alternating, Simulation, ZX-calculus — under
//! [`EquivalenceCheckingManager`], which races them to a verdict and reports
//! a [`Results`].
//!
//! ```
//! use arvak_eqcheck::{Configuration, EquivalenceCheckingManager};
//! use arvak_ir::Circuit;
//!
//! let c1 = Circuit::bell().unwrap();
//! let c2 = Circuit::bell().unwrap();
//! let manager = EquivalenceCheckingManager::new(c1, c2, Configuration::default()).unwrap();
//! let results = manager.run().unwrap();
//! assert!(results.criterion.is_equivalent());
//! ```

pub mod application_scheme;
pub mod checkers;
pub mod config;
pub mod criterion;
pub mod error;
pub mod gate_lowering;
pub mod manager;
pub mod preprocess;
pub mod task_manager;

pub use arvak_ir::Permutation;
pub use config::{ApplicationSchemeKind, ApplicationSchemes, Configuration, GateCostProfile, Optimizations, StateType};
pub use criterion::EquivalenceCriterion;
pub use error::{EqCheckError, EqCheckResult};
pub use manager::{EquivalenceCheckingManager, Results};
