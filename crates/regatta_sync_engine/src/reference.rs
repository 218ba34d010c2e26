//! The device's local copy of reference data.
//!
//! Records arrive keyed by sync ID and are assigned device-local
//! sequential identifiers on receipt. Local identifiers never leave the
//! device; they exist so the field UI and local relations can use
//! compact keys.

use regatta_sync_protocol::ReferenceGraph;
use regatta_types::{LocalId, RecordPayload, SyncId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serializable reference-store state.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    /// Stored records with their local identifiers.
    pub entries: Vec<(LocalId, RecordPayload)>,
    /// Next local identifier to assign.
    pub next_local: u64,
}

/// Device-local store of downloaded reference records.
#[derive(Debug, Default)]
pub struct ReferenceStore {
    records: HashMap<SyncId, (LocalId, RecordPayload)>,
    next_local: u64,
}

impl ReferenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: ReferenceSnapshot) -> Self {
        let records = snapshot
            .entries
            .into_iter()
            .map(|(local, payload)| (payload.sync_id(), (local, payload)))
            .collect();
        Self {
            records,
            next_local: snapshot.next_local,
        }
    }

    /// Returns a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ReferenceSnapshot {
        let mut entries: Vec<(LocalId, RecordPayload)> = self.records.values().cloned().collect();
        entries.sort_by_key(|(local, _)| *local);
        ReferenceSnapshot {
            entries,
            next_local: self.next_local,
        }
    }

    /// Inserts or updates a record, returning its local identifier.
    ///
    /// A record already present keeps the local identifier it was
    /// first assigned; its payload is updated in place.
    pub fn insert(&mut self, payload: RecordPayload) -> LocalId {
        let id = payload.sync_id();
        match self.records.get_mut(&id) {
            Some((local, existing)) => {
                *existing = payload;
                *local
            }
            None => {
                let local = LocalId(self.next_local);
                self.next_local += 1;
                self.records.insert(id, (local, payload));
                local
            }
        }
    }

    /// Applies a downloaded reference graph in dependency order.
    ///
    /// Returns the number of records that were new to this device.
    /// Re-applying the same graph is a no-op.
    pub fn apply_graph(&mut self, graph: &ReferenceGraph) -> usize {
        let mut added = 0;
        for payload in graph.payloads() {
            let known = self.records.contains_key(&payload.sync_id());
            self.insert(payload);
            if !known {
                added += 1;
            }
        }
        added
    }

    /// Resolves a sync ID to the local identifier assigned on receipt.
    #[must_use]
    pub fn local_id(&self, id: SyncId) -> Option<LocalId> {
        self.records.get(&id).map(|(local, _)| *local)
    }

    /// Looks up a record by sync ID.
    #[must_use]
    pub fn get(&self, id: SyncId) -> Option<&RecordPayload> {
        self.records.get(&id).map(|(_, payload)| payload)
    }

    /// Returns true if the record is present.
    #[must_use]
    pub fn contains(&self, id: SyncId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Removes every record. Part of the explicit "clear for next
    /// event" action.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
