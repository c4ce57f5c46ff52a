//! The verdict a checker (or the manager) reaches about two circuits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of an equivalence check.
///
/// Ordered roughly by how "final" a verdict is: `NotEquivalent` and
/// `Equivalent` (and its phase-qualified variants) end the check early;
/// `ProbablyEquivalent`/`ProbablyNotEquivalent` are best-effort verdicts from
/// checkers that are sound in only one direction (Simulation, ZX);
/// `NoInformation` means no checker reached a verdict before cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquivalenceCriterion {
    /// The circuits are definitively not equivalent.
    NotEquivalent,
    /// The circuits are exactly equivalent.
    Equivalent,
    /// No checker produced a verdict (cancellation, timeout, or none enabled).
    NoInformation,
    /// All simulation runs up to `max_sims` agreed; no proof was attempted.
    ProbablyEquivalent,
    /// Equivalent save for a global phase factor.
    EquivalentUpToGlobalPhase,
    /// Equivalent up to an arbitrary (not necessarily global) phase.
    EquivalentUpToPhase,
    /// The ZX checker exhausted its rewrite rules without reaching identity;
    /// sound for equivalence but incomplete for non-equivalence.
    ProbablyNotEquivalent,
}

impl EquivalenceCriterion {
    /// Canonical lowercase-with-underscores name, matching the original
    /// implementation's `toString`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotEquivalent => "not_equivalent",
            Self::Equivalent => "equivalent",
            Self::NoInformation => "no_information",
            Self::ProbablyEquivalent => "probably_equivalent",
            Self::EquivalentUpToGlobalPhase => "equivalent_up_to_global_phase",
            Self::EquivalentUpToPhase => "equivalent_up_to_phase",
            Self::ProbablyNotEquivalent => "probably_not_equivalent",
        }
    }

    /// Parse from the canonical string form, falling back to `NoInformation`
    /// for unrecognized tokens (matching the original's `fromString`).
    pub fn from_str_lenient(s: &str) -> Self {
        match s {
            "not_equivalent" => Self::NotEquivalent,
            "equivalent" => Self::Equivalent,
            "probably_equivalent" => Self::ProbablyEquivalent,
            "equivalent_up_to_global_phase" => Self::EquivalentUpToGlobalPhase,
            "equivalent_up_to_phase" => Self::EquivalentUpToPhase,
            "probably_not_equivalent" => Self::ProbablyNotEquivalent,
            _ => Self::NoInformation,
        }
    }

    /// Whether this verdict should end a race-to-decision check immediately:
    /// every variant except the two "probably" verdicts and `NoInformation`.
    pub fn is_definitive(self) -> bool {
        matches!(
            self,
            Self::NotEquivalent
                | Self::Equivalent
                | Self::EquivalentUpToGlobalPhase
                | Self::EquivalentUpToPhase
        )
    }

    /// Whether this verdict reports some form of equivalence.
    pub fn is_equivalent(self) -> bool {
        matches!(
            self,
            Self::Equivalent
                | Self::EquivalentUpToGlobalPhase
                | Self::EquivalentUpToPhase
                | Self::ProbablyEquivalent
        )
    }
}

impl fmt::Display for EquivalenceCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_canonical_strings() {
        for c in [
            EquivalenceCriterion::NotEquivalent,
            EquivalenceCriterion::Equivalent,
            EquivalenceCriterion::NoInformation,
            EquivalenceCriterion::ProbablyEquivalent,
            EquivalenceCriterion::EquivalentUpToGlobalPhase,
            EquivalenceCriterion::EquivalentUpToPhase,
            EquivalenceCriterion::ProbablyNotEquivalent,
        ] {
            assert_eq!(EquivalenceCriterion::from_str_lenient(c.as_str()), c);
        }
    }

    #[test]
    fn test_unknown_token_defaults_to_no_information() {
        assert_eq!(
            EquivalenceCriterion::from_str_lenient("garbage"),
            EquivalenceCriterion::NoInformation
        );
    }
}
