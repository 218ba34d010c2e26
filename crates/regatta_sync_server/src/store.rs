//! The hub's committed-record store.
//!
//! All commit decisions run under one write guard, so deduplication
//! decisions for any given identifier are serialized: two concurrent
//! submissions of the same identifier cannot both pass the identity
//! layer and both create.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use regatta_sync_protocol::ReferenceGraph;
use regatta_types::{
    DeviceId, Fingerprint, IncidentCase, IncidentReport, RecordPayload, SyncId,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Audit entry for a layer-2 auto-merge. Not a conflict: the merge
/// needs no operator attention, but it must stay observable.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeNote {
    /// The case that survived.
    pub surviving: SyncId,
    /// The case shell that was folded into it.
    pub merged: SyncId,
    /// The device whose submission triggered the merge.
    pub source_device: DeviceId,
    /// When the merge happened (Unix millis).
    pub merged_at_ms: u64,
}

/// The hub's record tables. Obtained through [`HubStore::read`] /
/// [`HubStore::write`].
#[derive(Debug, Default)]
pub struct HubState {
    records: HashMap<SyncId, RecordPayload>,
    case_fingerprints: HashMap<Fingerprint, SyncId>,
    merged_aliases: HashMap<SyncId, SyncId>,
    reports_by_case: HashMap<SyncId, Vec<SyncId>>,
    merge_notes: Vec<MergeNote>,
}

impl HubState {
    /// Looks up a committed record.
    #[must_use]
    pub fn get(&self, id: SyncId) -> Option<&RecordPayload> {
        self.records.get(&id)
    }

    /// Returns true if a record with this identifier is committed.
    #[must_use]
    pub fn contains(&self, id: SyncId) -> bool {
        self.records.contains_key(&id)
    }

    /// Resolves a case identifier to the surviving case, following the
    /// merge alias map. Returns `None` if the identifier is unknown.
    #[must_use]
    pub fn resolve_case(&self, id: SyncId) -> Option<SyncId> {
        let mut current = id;
        // Alias chains are one hop long today; the bound keeps a
        // corrupted map from looping.
        for _ in 0..32 {
            if self.records.contains_key(&current) {
                return Some(current);
            }
            match self.merged_aliases.get(&current) {
                Some(next) => current = *next,
                None => return None,
            }
        }
        None
    }

    /// Returns the surviving case a merged-away identifier points to.
    #[must_use]
    pub fn alias_of(&self, id: SyncId) -> Option<SyncId> {
        self.merged_aliases.get(&id).copied().and_then(|target| {
            self.resolve_case(target)
        })
    }

    /// Looks up a not-merged-away case by fingerprint.
    #[must_use]
    pub fn case_by_fingerprint(&self, fingerprint: Fingerprint) -> Option<SyncId> {
        self.case_fingerprints.get(&fingerprint).copied()
    }

    /// Commits a reference record.
    pub fn insert_reference(&mut self, payload: RecordPayload) {
        self.records.insert(payload.sync_id(), payload);
    }

    /// Commits a new case and indexes its fingerprint.
    pub fn insert_case(&mut self, case: IncidentCase, fingerprint: Fingerprint) {
        self.case_fingerprints.insert(fingerprint, case.sync_id);
        self.records
            .insert(case.sync_id, RecordPayload::Case(case));
    }

    /// Commits a report under its (already resolved) parent case.
    pub fn insert_report(&mut self, report: IncidentReport) {
        self.reports_by_case
            .entry(report.case)
            .or_default()
            .push(report.sync_id);
        self.records
            .insert(report.sync_id, RecordPayload::Report(report));
    }

    /// Records that an incoming case shell was folded into a surviving
    /// case: later submissions referencing the merged identifier
    /// re-parent onto the survivor.
    pub fn merge_case(
        &mut self,
        merged: SyncId,
        surviving: SyncId,
        source_device: DeviceId,
        now_ms: u64,
    ) {
        self.merged_aliases.insert(merged, surviving);
        if let Some(mut orphaned) = self.reports_by_case.remove(&merged) {
            self.reports_by_case
                .entry(surviving)
                .or_default()
                .append(&mut orphaned);
        }
        self.merge_notes.push(MergeNote {
            surviving,
            merged,
            source_device,
            merged_at_ms: now_ms,
        });
        info!(merged = %merged, surviving = %surviving, "case auto-merged");
    }

    /// Replaces a committed record wholesale (conflict resolution).
    ///
    /// For cases the fingerprint index entry is refreshed; for reports
    /// a parent change moves the membership.
    pub fn replace_record(&mut self, payload: RecordPayload, bucket: Duration) {
        let id = payload.sync_id();

        if let RecordPayload::Case(case) = &payload {
            self.case_fingerprints.retain(|_, v| *v != id);
            self.case_fingerprints
                .insert(Fingerprint::of_case(case, bucket), id);
        }

        if let RecordPayload::Report(report) = &payload {
            if let Some(RecordPayload::Report(old)) = self.records.get(&id) {
                if old.case != report.case {
                    if let Some(ids) = self.reports_by_case.get_mut(&old.case) {
                        ids.retain(|r| *r != id);
                    }
                    self.reports_by_case
                        .entry(report.case)
                        .or_default()
                        .push(id);
                }
            }
        }

        self.records.insert(id, payload);
    }

    /// Collects the reference graph for one competition, or `None` if
    /// the competition is unknown.
    #[must_use]
    pub fn reference_graph(&self, competition: SyncId) -> Option<ReferenceGraph> {
        let competition_record = match self.records.get(&competition) {
            Some(RecordPayload::Competition(c)) => c.clone(),
            _ => return None,
        };

        let mut graph = ReferenceGraph {
            competition: Some(competition_record),
            ..ReferenceGraph::default()
        };

        for payload in self.records.values() {
            match payload {
                RecordPayload::Stage(s) if s.competition == competition => {
                    graph.stages.push(s.clone());
                }
                RecordPayload::Location(l) if l.competition == competition => {
                    graph.locations.push(l.clone());
                }
                RecordPayload::Athlete(a) if a.competition == competition => {
                    graph.athletes.push(a.clone());
                }
                _ => {}
            }
        }
        graph.stages.sort_by_key(|s| s.ordinal);

        let stage_ids: Vec<SyncId> = graph.stages.iter().map(|s| s.sync_id).collect();
        for payload in self.records.values() {
            if let RecordPayload::Race(r) = payload {
                if stage_ids.contains(&r.stage) {
                    graph.races.push(r.clone());
                }
            }
        }
        graph.races.sort_by_key(|r| r.scheduled_at_ms);

        let race_ids: Vec<SyncId> = graph.races.iter().map(|r| r.sync_id).collect();
        for payload in self.records.values() {
            if let RecordPayload::Entry(e) = payload {
                if race_ids.contains(&e.race) {
                    graph.entries.push(e.clone());
                }
            }
        }
        graph.entries.sort_by_key(|e| e.bib_number);

        Some(graph)
    }

    /// Returns the reports attached to a case, resolving the merge
    /// alias map first.
    #[must_use]
    pub fn reports_of(&self, case: SyncId) -> Vec<IncidentReport> {
        let Some(case) = self.resolve_case(case) else {
            return Vec::new();
        };
        self.reports_by_case
            .get(&case)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| match self.records.get(id) {
                        Some(RecordPayload::Report(r)) => Some(r.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The auto-merge audit log.
    #[must_use]
    pub fn merge_notes(&self) -> &[MergeNote] {
        &self.merge_notes
    }

    /// Number of committed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Shared, locked hub state.
///
/// The deduplication engine holds the write guard for the whole of a
/// per-record decision; everything else takes short read guards.
#[derive(Debug, Default)]
pub struct HubStore {
    state: RwLock<HubState>,
}

impl HubStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the read guard.
    pub fn read(&self) -> RwLockReadGuard<'_, HubState> {
        self.state.read()
    }

    /// Takes the write guard.
    pub fn write(&self) -> RwLockWriteGuard<'_, HubState> {
        self.state.write()
    }
}
