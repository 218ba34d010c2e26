//! Protocol messages for sync.

use crate::outcome::RecordOutcome;
use regatta_types::{
    Athlete, Competition, DeviceId, Entry, EntityKind, Location, Race, RecordPayload, Stage, SyncId,
};
use serde::{Deserialize, Serialize};

/// Download request: the full reference graph for one competition.
///
/// Consumed once before a device goes to the field.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// The requesting device.
    pub device: DeviceId,
    /// Authentication token for the device.
    pub token: Vec<u8>,
    /// The competition to download.
    pub competition: SyncId,
}

/// The reference-data graph for one competition, keyed by sync IDs.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ReferenceGraph {
    /// The competition itself.
    pub competition: Option<Competition>,
    /// Its stages.
    pub stages: Vec<Stage>,
    /// Races of those stages.
    pub races: Vec<Race>,
    /// Judging locations.
    pub locations: Vec<Location>,
    /// Registered athletes.
    pub athletes: Vec<Athlete>,
    /// Race entries.
    pub entries: Vec<Entry>,
}

impl ReferenceGraph {
    /// Total number of records in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.competition.is_some())
            + self.stages.len()
            + self.races.len()
            + self.locations.len()
            + self.athletes.len()
            + self.entries.len()
    }

    /// Returns true if the graph carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the graph into payloads, in dependency order.
    #[must_use]
    pub fn payloads(&self) -> Vec<RecordPayload> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.competition.clone().map(RecordPayload::Competition));
        out.extend(self.stages.iter().cloned().map(RecordPayload::Stage));
        out.extend(self.races.iter().cloned().map(RecordPayload::Race));
        out.extend(self.locations.iter().cloned().map(RecordPayload::Location));
        out.extend(self.athletes.iter().cloned().map(RecordPayload::Athlete));
        out.extend(self.entries.iter().cloned().map(RecordPayload::Entry));
        out
    }
}

/// Download response.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    /// The reference graph.
    pub graph: ReferenceGraph,
}

/// Upload request: all queued records of one kind, in queue order.
///
/// One logical endpoint exists per entity kind; kinds are uploaded in
/// dependency order so the hub can resolve every reference at commit
/// time. Child records reference parents by sync ID only.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct UploadRequest {
    /// The submitting device. Every record in the batch is attributed
    /// to it.
    pub device: DeviceId,
    /// Authentication token for the device.
    pub token: Vec<u8>,
    /// The kind every record in this request must have.
    pub kind: EntityKind,
    /// The records to commit.
    pub records: Vec<RecordPayload>,
}

impl UploadRequest {
    /// Creates an upload request.
    pub fn new(
        device: DeviceId,
        token: Vec<u8>,
        kind: EntityKind,
        records: Vec<RecordPayload>,
    ) -> Self {
        Self {
            device,
            token,
            kind,
            records,
        }
    }
}

/// Upload response: one outcome per submitted record, same order.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Per-record outcomes, parallel to the request's `records`.
    pub outcomes: Vec<RecordOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_cbor, to_cbor};
    use regatta_types::CaseDecision;
    use regatta_types::IncidentCase;

    fn sample_graph() -> ReferenceGraph {
        let device = DeviceId::from_bytes([1u8; 16]);
        let competition = Competition {
            sync_id: SyncId::from_bytes([10u8; 16]),
            name: "Spring Regatta".into(),
            venue: "Lakeside".into(),
            created_at_ms: 1,
            updated_at_ms: 1,
            created_by: device,
        };
        let stage = Stage {
            sync_id: SyncId::from_bytes([11u8; 16]),
            competition: competition.sync_id,
            name: "Heats".into(),
            ordinal: 1,
            created_at_ms: 2,
            updated_at_ms: 2,
            created_by: device,
        };
        ReferenceGraph {
            competition: Some(competition),
            stages: vec![stage],
            ..ReferenceGraph::default()
        }
    }

    #[test]
    fn graph_len_and_order() {
        let graph = sample_graph();
        assert_eq!(graph.len(), 2);
        assert!(!graph.is_empty());

        let payloads = graph.payloads();
        assert_eq!(payloads.len(), 2);
        for window in payloads.windows(2) {
            assert!(window[0].kind().dependency_rank() <= window[1].kind().dependency_rank());
        }
    }

    #[test]
    fn download_roundtrip() {
        let response = DownloadResponse {
            graph: sample_graph(),
        };
        let bytes = to_cbor(&response).unwrap();
        let decoded: DownloadResponse = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn upload_roundtrip() {
        let case = IncidentCase {
            sync_id: SyncId::from_bytes([7u8; 16]),
            race: SyncId::from_bytes([2u8; 16]),
            location: SyncId::from_bytes([3u8; 16]),
            bib_number: 42,
            decision: CaseDecision::Open,
            notes: "missed gate".into(),
            created_at_ms: 5,
            updated_at_ms: 5,
            created_by: DeviceId::from_bytes([1u8; 16]),
        };
        let request = UploadRequest::new(
            DeviceId::from_bytes([1u8; 16]),
            vec![0xAA],
            EntityKind::Case,
            vec![RecordPayload::Case(case)],
        );
        let bytes = to_cbor(&request).unwrap();
        let decoded: UploadRequest = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, request);

        let response = UploadResponse {
            outcomes: vec![RecordOutcome::Created],
        };
        let bytes = to_cbor(&response).unwrap();
        let decoded: UploadResponse = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, response);
    }
}
