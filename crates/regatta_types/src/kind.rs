//! Entity kinds and their fixed dependency order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a syncable entity.
///
/// Kinds are transferred in a fixed topological order of their
/// foreign-key graph, reference data first, so that the hub can resolve
/// every cross-replica reference at commit time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A competition (top of the reference graph).
    Competition,
    /// A stage within a competition.
    Stage,
    /// A race within a stage.
    Race,
    /// A judging location at the venue.
    Location,
    /// A registered athlete.
    Athlete,
    /// An entry (athlete in a race, carrying the bib number).
    Entry,
    /// An incident case (operational, unit of deduplication).
    Case,
    /// An observation report attached to a case (operational).
    Report,
}

/// Whether a kind is copied outward once or created concurrently.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum EntityCategory {
    /// Created exactly once, by exactly one replica, then copied.
    Reference,
    /// Created independently on multiple replicas; deduplicated.
    Operational,
}

impl EntityKind {
    /// All kinds, in dependency order.
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Competition,
        EntityKind::Stage,
        EntityKind::Race,
        EntityKind::Location,
        EntityKind::Athlete,
        EntityKind::Entry,
        EntityKind::Case,
        EntityKind::Report,
    ];

    /// Returns the rank of this kind in the dependency order.
    ///
    /// A kind may only reference kinds with a strictly lower rank.
    #[must_use]
    pub fn dependency_rank(&self) -> u8 {
        match self {
            EntityKind::Competition => 0,
            EntityKind::Stage => 1,
            EntityKind::Race => 2,
            EntityKind::Location => 3,
            EntityKind::Athlete => 4,
            EntityKind::Entry => 5,
            EntityKind::Case => 6,
            EntityKind::Report => 7,
        }
    }

    /// Returns the category of this kind.
    #[must_use]
    pub fn category(&self) -> EntityCategory {
        match self {
            EntityKind::Case | EntityKind::Report => EntityCategory::Operational,
            _ => EntityCategory::Reference,
        }
    }

    /// Returns true for reference data.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.category() == EntityCategory::Reference
    }

    /// Returns the stable wire name of this kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Competition => "competition",
            EntityKind::Stage => "stage",
            EntityKind::Race => "race",
            EntityKind::Location => "location",
            EntityKind::Athlete => "athlete",
            EntityKind::Entry => "entry",
            EntityKind::Case => "case",
            EntityKind::Report => "report",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_in_rank_order() {
        for window in EntityKind::ALL.windows(2) {
            assert!(window[0].dependency_rank() < window[1].dependency_rank());
        }
    }

    #[test]
    fn ranks_are_dense() {
        for (i, kind) in EntityKind::ALL.iter().enumerate() {
            assert_eq!(kind.dependency_rank() as usize, i);
        }
    }

    #[test]
    fn operational_kinds_come_last() {
        let first_operational = EntityKind::ALL
            .iter()
            .position(|k| k.category() == EntityCategory::Operational)
            .unwrap();
        assert!(EntityKind::ALL[first_operational..]
            .iter()
            .all(|k| k.category() == EntityCategory::Operational));
        assert!(EntityKind::ALL[..first_operational]
            .iter()
            .all(|k| k.is_reference()));
    }

    #[test]
    fn display_matches_name() {
        assert_eq!(EntityKind::Case.to_string(), "case");
        assert_eq!(EntityKind::Competition.to_string(), "competition");
    }
}
