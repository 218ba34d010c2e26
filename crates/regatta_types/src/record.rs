//! Domain records for reference and operational data.
//!
//! Every record carries its replica-independent [`SyncId`], the
//! [`DeviceId`] of the replica that created it, and creation/update
//! timestamps in Unix milliseconds. Relationships are expressed as
//! `SyncId` references only; local sequential identifiers never appear
//! in a record.

use crate::id::{DeviceId, SyncId};
use crate::kind::EntityKind;
use serde::{Deserialize, Serialize};

/// A competition, the root of the reference graph.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Competition {
    /// Replica-independent identifier.
    pub sync_id: SyncId,
    /// Display name.
    pub name: String,
    /// Venue name.
    pub venue: String,
    /// Creation time (Unix millis).
    pub created_at_ms: u64,
    /// Last modification time (Unix millis). Volatile for equivalence.
    pub updated_at_ms: u64,
    /// Replica that created the record.
    pub created_by: DeviceId,
}

/// A stage (round) within a competition.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Stage {
    /// Replica-independent identifier.
    pub sync_id: SyncId,
    /// Owning competition.
    pub competition: SyncId,
    /// Display name.
    pub name: String,
    /// Position within the competition schedule.
    pub ordinal: u32,
    /// Creation time (Unix millis).
    pub created_at_ms: u64,
    /// Last modification time (Unix millis). Volatile for equivalence.
    pub updated_at_ms: u64,
    /// Replica that created the record.
    pub created_by: DeviceId,
}

/// A race within a stage.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Race {
    /// Replica-independent identifier.
    pub sync_id: SyncId,
    /// Owning stage.
    pub stage: SyncId,
    /// Display name.
    pub name: String,
    /// Scheduled start time (Unix millis).
    pub scheduled_at_ms: u64,
    /// Creation time (Unix millis).
    pub created_at_ms: u64,
    /// Last modification time (Unix millis). Volatile for equivalence.
    pub updated_at_ms: u64,
    /// Replica that created the record.
    pub created_by: DeviceId,
}

/// A judging location at the venue.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Location {
    /// Replica-independent identifier.
    pub sync_id: SyncId,
    /// Owning competition.
    pub competition: SyncId,
    /// Short code shown on the field UI (e.g. "L1").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Creation time (Unix millis).
    pub created_at_ms: u64,
    /// Last modification time (Unix millis). Volatile for equivalence.
    pub updated_at_ms: u64,
    /// Replica that created the record.
    pub created_by: DeviceId,
}

/// A registered athlete.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Athlete {
    /// Replica-independent identifier.
    pub sync_id: SyncId,
    /// Owning competition.
    pub competition: SyncId,
    /// Given name.
    pub given_name: String,
    /// Family name.
    pub family_name: String,
    /// Club or national federation.
    pub club: String,
    /// Creation time (Unix millis).
    pub created_at_ms: u64,
    /// Last modification time (Unix millis). Volatile for equivalence.
    pub updated_at_ms: u64,
    /// Replica that created the record.
    pub created_by: DeviceId,
}

/// An entry: an athlete started in a race under a bib number.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Entry {
    /// Replica-independent identifier.
    pub sync_id: SyncId,
    /// The race.
    pub race: SyncId,
    /// The athlete.
    pub athlete: SyncId,
    /// Bib number worn in this race.
    pub bib_number: u32,
    /// Creation time (Unix millis).
    pub created_at_ms: u64,
    /// Last modification time (Unix millis). Volatile for equivalence.
    pub updated_at_ms: u64,
    /// Replica that created the record.
    pub created_by: DeviceId,
}

/// Decision recorded on an incident case.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseDecision {
    /// No decision yet.
    Open,
    /// A penalty was applied.
    PenaltyApplied,
    /// Reviewed, no action taken.
    NoAction,
}

impl CaseDecision {
    /// Returns true once a decision has been taken.
    #[must_use]
    pub fn is_decided(&self) -> bool {
        !matches!(self, CaseDecision::Open)
    }
}

/// An incident case, the unit of deduplication.
///
/// Cases are created independently on multiple replicas when judges
/// observe the same real-world event; the hub reconciles them by
/// identity and by fingerprint.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct IncidentCase {
    /// Replica-independent identifier.
    pub sync_id: SyncId,
    /// The race the incident happened in.
    pub race: SyncId,
    /// The location it was observed at.
    pub location: SyncId,
    /// Bib number of the participant involved.
    pub bib_number: u32,
    /// Current decision.
    pub decision: CaseDecision,
    /// Free-form judge notes.
    pub notes: String,
    /// Creation time (Unix millis); fingerprint input.
    pub created_at_ms: u64,
    /// Last modification time (Unix millis). Volatile for equivalence.
    pub updated_at_ms: u64,
    /// Replica that created the record.
    pub created_by: DeviceId,
}

/// An observation report, an append-only child of a case.
///
/// Reports are merged by re-parenting and never deleted except through
/// case deletion.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct IncidentReport {
    /// Replica-independent identifier.
    pub sync_id: SyncId,
    /// Parent case, referenced by sync ID.
    pub case: SyncId,
    /// When the observation was made (Unix millis).
    pub observed_at_ms: u64,
    /// What was observed.
    pub description: String,
    /// Creation time (Unix millis).
    pub created_at_ms: u64,
    /// Last modification time (Unix millis). Volatile for equivalence.
    pub updated_at_ms: u64,
    /// Replica that created the record.
    pub created_by: DeviceId,
}

/// A kind-tagged syncable record, as transferred on the wire and held
/// in queues and stores.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    /// A competition record.
    Competition(Competition),
    /// A stage record.
    Stage(Stage),
    /// A race record.
    Race(Race),
    /// A location record.
    Location(Location),
    /// An athlete record.
    Athlete(Athlete),
    /// An entry record.
    Entry(Entry),
    /// An incident case.
    Case(IncidentCase),
    /// An incident report.
    Report(IncidentReport),
}

impl RecordPayload {
    /// Returns the kind of the wrapped record.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordPayload::Competition(_) => EntityKind::Competition,
            RecordPayload::Stage(_) => EntityKind::Stage,
            RecordPayload::Race(_) => EntityKind::Race,
            RecordPayload::Location(_) => EntityKind::Location,
            RecordPayload::Athlete(_) => EntityKind::Athlete,
            RecordPayload::Entry(_) => EntityKind::Entry,
            RecordPayload::Case(_) => EntityKind::Case,
            RecordPayload::Report(_) => EntityKind::Report,
        }
    }

    /// Returns the record's replica-independent identifier.
    #[must_use]
    pub fn sync_id(&self) -> SyncId {
        match self {
            RecordPayload::Competition(r) => r.sync_id,
            RecordPayload::Stage(r) => r.sync_id,
            RecordPayload::Race(r) => r.sync_id,
            RecordPayload::Location(r) => r.sync_id,
            RecordPayload::Athlete(r) => r.sync_id,
            RecordPayload::Entry(r) => r.sync_id,
            RecordPayload::Case(r) => r.sync_id,
            RecordPayload::Report(r) => r.sync_id,
        }
    }

    /// Returns the replica that created the record.
    #[must_use]
    pub fn created_by(&self) -> DeviceId {
        match self {
            RecordPayload::Competition(r) => r.created_by,
            RecordPayload::Stage(r) => r.created_by,
            RecordPayload::Race(r) => r.created_by,
            RecordPayload::Location(r) => r.created_by,
            RecordPayload::Athlete(r) => r.created_by,
            RecordPayload::Entry(r) => r.created_by,
            RecordPayload::Case(r) => r.created_by,
            RecordPayload::Report(r) => r.created_by,
        }
    }

    /// Returns the creation time in Unix milliseconds.
    #[must_use]
    pub fn created_at_ms(&self) -> u64 {
        match self {
            RecordPayload::Competition(r) => r.created_at_ms,
            RecordPayload::Stage(r) => r.created_at_ms,
            RecordPayload::Race(r) => r.created_at_ms,
            RecordPayload::Location(r) => r.created_at_ms,
            RecordPayload::Athlete(r) => r.created_at_ms,
            RecordPayload::Entry(r) => r.created_at_ms,
            RecordPayload::Case(r) => r.created_at_ms,
            RecordPayload::Report(r) => r.created_at_ms,
        }
    }

    /// Returns the sync IDs this record references and which must be
    /// resolvable on the receiving side before it can commit.
    #[must_use]
    pub fn references(&self) -> Vec<SyncId> {
        match self {
            RecordPayload::Competition(_) => Vec::new(),
            RecordPayload::Stage(r) => vec![r.competition],
            RecordPayload::Race(r) => vec![r.stage],
            RecordPayload::Location(r) => vec![r.competition],
            RecordPayload::Athlete(r) => vec![r.competition],
            RecordPayload::Entry(r) => vec![r.race, r.athlete],
            RecordPayload::Case(r) => vec![r.race, r.location],
            RecordPayload::Report(r) => vec![r.case],
        }
    }

    /// Returns the decision, if the wrapped record is a case.
    #[must_use]
    pub fn decision(&self) -> Option<CaseDecision> {
        match self {
            RecordPayload::Case(r) => Some(r.decision),
            _ => None,
        }
    }

    /// Compares record content, ignoring fields whose difference is
    /// expected across replicas (currently `updated_at_ms`).
    ///
    /// This is the equivalence the hub's identity layer uses: a record
    /// resubmitted after a dropped acknowledgment compares equal, so
    /// at-least-once delivery is safe.
    #[must_use]
    pub fn content_eq(&self, other: &RecordPayload) -> bool {
        self.normalized() == other.normalized()
    }

    /// Returns a copy with `updated_at_ms` replaced, e.g. to stamp a
    /// record when an operator resolution overwrites hub state.
    #[must_use]
    pub fn with_updated_at(&self, updated_at_ms: u64) -> RecordPayload {
        let mut copy = self.clone();
        match &mut copy {
            RecordPayload::Competition(r) => r.updated_at_ms = updated_at_ms,
            RecordPayload::Stage(r) => r.updated_at_ms = updated_at_ms,
            RecordPayload::Race(r) => r.updated_at_ms = updated_at_ms,
            RecordPayload::Location(r) => r.updated_at_ms = updated_at_ms,
            RecordPayload::Athlete(r) => r.updated_at_ms = updated_at_ms,
            RecordPayload::Entry(r) => r.updated_at_ms = updated_at_ms,
            RecordPayload::Case(r) => r.updated_at_ms = updated_at_ms,
            RecordPayload::Report(r) => r.updated_at_ms = updated_at_ms,
        }
        copy
    }

    fn normalized(&self) -> RecordPayload {
        self.with_updated_at(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_case() -> IncidentCase {
        IncidentCase {
            sync_id: SyncId::from_bytes([7u8; 16]),
            race: SyncId::from_bytes([1u8; 16]),
            location: SyncId::from_bytes([2u8; 16]),
            bib_number: 42,
            decision: CaseDecision::Open,
            notes: "missed gate".into(),
            created_at_ms: 1_000,
            updated_at_ms: 1_000,
            created_by: DeviceId::from_bytes([9u8; 16]),
        }
    }

    #[test]
    fn payload_accessors() {
        let payload = RecordPayload::Case(sample_case());
        assert_eq!(payload.kind(), EntityKind::Case);
        assert_eq!(payload.sync_id(), SyncId::from_bytes([7u8; 16]));
        assert_eq!(
            payload.references(),
            vec![SyncId::from_bytes([1u8; 16]), SyncId::from_bytes([2u8; 16])]
        );
        assert_eq!(payload.decision(), Some(CaseDecision::Open));
    }

    #[test]
    fn content_eq_ignores_updated_at() {
        let a = RecordPayload::Case(sample_case());
        let mut case = sample_case();
        case.updated_at_ms = 99_999;
        let b = RecordPayload::Case(case);

        assert_ne!(a, b);
        assert!(a.content_eq(&b));
    }

    #[test]
    fn content_eq_detects_decision_change() {
        let a = RecordPayload::Case(sample_case());
        let mut case = sample_case();
        case.decision = CaseDecision::PenaltyApplied;
        let b = RecordPayload::Case(case);

        assert!(!a.content_eq(&b));
    }

    #[test]
    fn decision_state() {
        assert!(!CaseDecision::Open.is_decided());
        assert!(CaseDecision::PenaltyApplied.is_decided());
        assert!(CaseDecision::NoAction.is_decided());
    }

    #[test]
    fn competition_has_no_references() {
        let payload = RecordPayload::Competition(Competition {
            sync_id: SyncId::new(),
            name: "Nationals".into(),
            venue: "Lakeside".into(),
            created_at_ms: 0,
            updated_at_ms: 0,
            created_by: DeviceId::new(),
        });
        assert!(payload.references().is_empty());
    }
}
