//! Node and edge types for the decision-diagram arena.
//!
//! This package implements *quasi-reduced* decision diagrams: every path
//! from a root edge to the terminal passes through exactly one node per
//! qubit level, in order, even where a fully-reduced package (the original
//! QCEC's `mqt-core` DD package) would elide a level whose four children
//! are all identical. Quasi-reduced diagrams use a constant factor more
//! nodes than fully-reduced ones but make every recursive operation
//! (`multiply`, `kronecker`, `add`, ...) structurally simple: both operands
//! of a binary op are always defined over the same qubit at the same
//! recursion depth, so there is never a level-skip to reconcile. Canonicity
//! (invariant I1) is preserved — two computations of the same matrix/vector
//! still collapse to the same arena slot via the unique table.

use num_complex::Complex64;

/// Index into the package's node arena.
pub type NodeId = u32;

/// Sentinel `NodeId` representing the terminal (scalar) node. No arena slot
/// is ever allocated for it; an edge with this node and weight `w` denotes
/// the scalar `w`.
pub const TERMINAL: NodeId = u32::MAX;

/// A weighted pointer to a node (or the terminal).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Target node, or [`TERMINAL`].
    pub node: NodeId,
    /// Weight accumulated along this edge.
    pub weight: Complex64,
}

impl Edge {
    /// A terminal edge carrying the given scalar weight.
    pub fn terminal(weight: Complex64) -> Self {
        Self {
            node: TERMINAL,
            weight,
        }
    }

    /// The zero edge (terminal, weight 0).
    pub fn zero() -> Self {
        Self::terminal(Complex64::new(0.0, 0.0))
    }

    /// The scalar-one terminal edge.
    pub fn one() -> Self {
        Self::terminal(Complex64::new(1.0, 0.0))
    }

    /// Whether this edge's weight is (numerically) zero.
    pub fn is_zero_weight(&self) -> bool {
        self.weight.norm_sqr() < 1e-24
    }
}

/// The successor edges of a node: either a 2-way (vector) or 4-way (matrix,
/// row-major `[00, 01, 10, 11]`) branch.
#[derive(Debug, Clone, Copy)]
pub enum Successors {
    /// Vector-DD node: branch on this qubit being 0 or 1.
    Vector([Edge; 2]),
    /// Matrix-DD node: branch on (row, col) bit for this qubit.
    Matrix([Edge; 4]),
}

impl Successors {
    /// View successors as a vector pair; panics if this is a matrix node.
    pub fn as_vector(&self) -> [Edge; 2] {
        match self {
            Successors::Vector(v) => *v,
            Successors::Matrix(_) => panic!("as_vector called on a matrix node"),
        }
    }

    /// View successors as a matrix quadruple; panics if this is a vector node.
    pub fn as_matrix(&self) -> [Edge; 4] {
        match self {
            Successors::Matrix(m) => *m,
            Successors::Vector(_) => panic!("as_matrix called on a vector node"),
        }
    }

    /// Whether this is a matrix node.
    pub fn is_matrix(&self) -> bool {
        matches!(self, Successors::Matrix(_))
    }
}

/// An arena-resident decision-diagram node.
#[derive(Debug, Clone)]
pub struct Node {
    /// The qubit index this node branches on.
    pub level: u32,
    /// The successor edges.
    pub successors: Successors,
    /// Reference count: number of external edges currently holding this node.
    pub ref_count: u32,
}

impl Node {
    /// Whether, ignoring the incoming edge's own weight, this node's subgraph
    /// is the identity on levels `0..=level`. Computed lazily by the package
    /// (not cached on the node) since it depends on the full subgraph.
    pub fn looks_like_identity_shape(&self) -> bool {
        match self.successors {
            Successors::Matrix([e0, e1, e2, e3]) => {
                e1.is_zero_weight() && e2.is_zero_weight() && !e0.is_zero_weight() && e0.node == e3.node
            }
            Successors::Vector(_) => false,
        }
    }
}
