//! Logical-to-physical qubit permutations.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::qubit::QubitId;

/// A bijective map between logical and physical qubit indices.
///
/// Used to track `initial_layout` (how logical circuit qubits are placed onto
/// physical qubits at the start of execution) and `output_permutation` (how
/// they have moved by the end, e.g. after routing introduces SWAPs). An empty
/// permutation is the identity: every qubit maps to itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permutation(FxHashMap<QubitId, QubitId>);

impl Permutation {
    /// The identity permutation (no entries; every qubit maps to itself).
    pub fn identity() -> Self {
        Self::default()
    }

    /// Build the identity permutation over `0..num_qubits`, with explicit entries.
    pub fn identity_sized(num_qubits: u32) -> Self {
        let map = (0..num_qubits).map(|i| (QubitId(i), QubitId(i))).collect();
        Self(map)
    }

    /// Map `logical` to `physical`, overwriting any prior mapping for `logical`.
    pub fn set(&mut self, logical: QubitId, physical: QubitId) {
        self.0.insert(logical, physical);
    }

    /// Look up where `logical` maps to, defaulting to itself if unmapped.
    pub fn get(&self, logical: QubitId) -> QubitId {
        self.0.get(&logical).copied().unwrap_or(logical)
    }

    /// Whether this permutation has no explicit entries (pure identity).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over explicit `(logical, physical)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, QubitId)> + '_ {
        self.0.iter().map(|(&l, &p)| (l, p))
    }

    /// The inverse permutation: physical-to-logical becomes logical-to-physical.
    pub fn inverse(&self) -> Self {
        Self(self.0.iter().map(|(&l, &p)| (p, l)).collect())
    }

    /// Whether every entry maps a qubit to itself.
    pub fn is_identity(&self) -> bool {
        self.0.iter().all(|(&l, &p)| l == p)
    }

    /// Whether this permutation is a bijection over its domain: no two logical
    /// qubits map to the same physical qubit.
    pub fn is_bijective(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.0.len());
        self.0.values().all(|&p| seen.insert(p))
    }
}

impl FromIterator<(QubitId, QubitId)> for Permutation {
    fn from_iter<T: IntoIterator<Item = (QubitId, QubitId)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_maps_to_self() {
        let perm = Permutation::identity();
        assert_eq!(perm.get(QubitId(3)), QubitId(3));
        assert!(perm.is_identity());
    }

    #[test]
    fn test_identity_sized_has_explicit_entries() {
        let perm = Permutation::identity_sized(3);
        assert_eq!(perm.len(), 3);
        assert!(perm.is_identity());
    }

    #[test]
    fn test_set_and_get() {
        let mut perm = Permutation::identity();
        perm.set(QubitId(0), QubitId(2));
        assert_eq!(perm.get(QubitId(0)), QubitId(2));
        assert_eq!(perm.get(QubitId(1)), QubitId(1));
        assert!(!perm.is_identity());
    }

    #[test]
    fn test_inverse_round_trips() {
        let mut perm = Permutation::identity();
        perm.set(QubitId(0), QubitId(2));
        perm.set(QubitId(2), QubitId(0));
        perm.set(QubitId(1), QubitId(1));

        let inv = perm.inverse();
        for q in [QubitId(0), QubitId(1), QubitId(2)] {
            assert_eq!(inv.get(perm.get(q)), q);
        }
    }

    #[test]
    fn test_bijective_detection() {
        let mut perm = Permutation::identity();
        perm.set(QubitId(0), QubitId(1));
        perm.set(QubitId(1), QubitId(1));
        assert!(!perm.is_bijective());
    }
}
