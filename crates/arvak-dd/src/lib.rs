//! Decision-diagram package for representing and manipulating quantum
//! states and unitaries.
//!
//! `arvak-dd` is the numerical core equivalence checkers build on: a
//! canonical, weighted, quasi-reduced decision-diagram representation
//! (`node`), a value-identity cache for the complex weights that label DD
//! edges (`complex_cache`), and the [`Package`] that owns the arena, unique
//! table, compute caches, and every algebraic operation over diagrams
//! (construction, multiplication, tensoring, ancilla/garbage reduction,
//! permutation changes, and the scalar queries used to report an
//! equivalence verdict).
//!
//! A `Package` is never shared across threads — each checker in
//! `arvak-eqcheck` constructs and owns exactly one.
//!
//! ```
//! use arvak_dd::Package;
//! use num_complex::Complex64;
//!
//! let mut pkg = Package::new(2e-13);
//! let s = std::f64::consts::FRAC_1_SQRT_2;
//! let h = [
//!     Complex64::new(s, 0.0),
//!     Complex64::new(s, 0.0),
//!     Complex64::new(s, 0.0),
//!     Complex64::new(-s, 0.0),
//! ];
//! let h_dd = pkg.make_gate_dd(h, 1, 0, &[]);
//! let hh = pkg.multiply(h_dd, h_dd);
//! assert!(pkg.is_close_to_identity(hh, 1e-9));
//! ```

pub mod complex_cache;
pub mod error;
pub mod node;
pub mod package;

pub use complex_cache::ComplexCache;
pub use error::{DdError, DdResult};
pub use node::{Edge, Node, NodeId, Successors, TERMINAL};
pub use package::{Direction, Package};
