//! The conflict store and resolution workflow.
//!
//! Disagreements the deduplication engine refuses to resolve land here
//! for operator adjudication. A conflict record is created exactly once
//! per distinct (entity, source device, snapshot pair); resubmitting
//! the same disagreement does not accumulate duplicates. Resolution is
//! terminal: `pending → {hub-wins, device-wins, manual}`, never back.

use crate::error::{HubError, HubResult};
use crate::store::HubStore;
use parking_lot::Mutex;
use regatta_sync_protocol::{to_cbor, ConflictDetail, ConflictKind};
use regatta_types::{DeviceId, EntityKind, RecordPayload, SyncId};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Resolution state of a conflict record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Awaiting operator adjudication.
    Pending,
    /// The hub's state was kept; no write happened.
    HubWins,
    /// The incoming state replaced the hub's record.
    DeviceWins,
    /// An operator-edited value replaced the hub's record.
    Manual,
}

/// The action an operator chooses when resolving a conflict.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionAction {
    /// Keep the hub's existing state.
    HubWins,
    /// Overwrite with the incoming state (full field replace).
    DeviceWins,
    /// Apply an operator-edited value.
    Manual {
        /// The edited record; must carry the conflicted identifier.
        edited: RecordPayload,
    },
}

/// A persisted disagreement awaiting (or past) adjudication.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRecord {
    /// Hub-assigned conflict identifier.
    pub id: u64,
    /// What kind of disagreement was detected.
    pub kind: ConflictKind,
    /// Kind of the entity in conflict.
    pub entity_kind: EntityKind,
    /// The contested identifier.
    pub entity: SyncId,
    /// The device whose submission raised the conflict.
    pub source_device: DeviceId,
    /// The hub's state at detection time.
    pub hub_snapshot: RecordPayload,
    /// The submitted state.
    pub incoming_snapshot: RecordPayload,
    /// Current resolution state.
    pub resolution: ConflictResolution,
    /// Who resolved it.
    pub resolved_by: Option<String>,
    /// When it was resolved (Unix millis).
    pub resolved_at_ms: Option<u64>,
    /// When it was raised (Unix millis).
    pub raised_at_ms: u64,
}

#[derive(Default)]
struct ConflictTables {
    records: BTreeMap<u64, ConflictRecord>,
    keys: HashMap<[u8; 32], u64>,
    next_id: u64,
}

/// Persists conflicts and applies operator resolutions.
pub struct ConflictStore {
    tables: Mutex<ConflictTables>,
    store: Arc<HubStore>,
    bucket: Duration,
}

impl ConflictStore {
    /// Creates a conflict store that applies resolutions to `store`.
    pub fn new(store: Arc<HubStore>, bucket: Duration) -> Self {
        Self {
            tables: Mutex::new(ConflictTables::default()),
            store,
            bucket,
        }
    }

    /// Persists a pending conflict, exactly once per distinct
    /// disagreement. Returns the conflict id (existing or new).
    pub fn raise(&self, detail: &ConflictDetail, source: DeviceId, now_ms: u64) -> u64 {
        let key = dedup_key(detail, source);
        let mut tables = self.tables.lock();

        if let Some(id) = tables.keys.get(&key) {
            return *id;
        }

        tables.next_id += 1;
        let id = tables.next_id;
        tables.records.insert(
            id,
            ConflictRecord {
                id,
                kind: detail.kind,
                entity_kind: detail.entity_kind,
                entity: detail.entity,
                source_device: source,
                hub_snapshot: detail.hub_snapshot.clone(),
                incoming_snapshot: detail.incoming_snapshot.clone(),
                resolution: ConflictResolution::Pending,
                resolved_by: None,
                resolved_at_ms: None,
                raised_at_ms: now_ms,
            },
        );
        tables.keys.insert(key, id);
        warn!(conflict = id, entity = %detail.entity, kind = ?detail.kind, "conflict raised");
        id
    }

    /// Applies an operator's resolution. Resolutions are terminal;
    /// resolving twice fails with [`HubError::ConflictAlreadyResolved`].
    pub fn resolve(
        &self,
        id: u64,
        action: ResolutionAction,
        operator: &str,
        now_ms: u64,
    ) -> HubResult<()> {
        let write = {
            let mut tables = self.tables.lock();
            let record = tables
                .records
                .get_mut(&id)
                .ok_or(HubError::UnknownConflict(id))?;
            if record.resolution != ConflictResolution::Pending {
                return Err(HubError::ConflictAlreadyResolved(id));
            }

            let (resolution, write) = match action {
                ResolutionAction::HubWins => (ConflictResolution::HubWins, None),
                ResolutionAction::DeviceWins => (
                    ConflictResolution::DeviceWins,
                    Some(record.incoming_snapshot.with_updated_at(now_ms)),
                ),
                ResolutionAction::Manual { edited } => {
                    if edited.sync_id() != record.entity {
                        return Err(HubError::InvalidRequest(format!(
                            "edited record carries {}, conflict is about {}",
                            edited.sync_id(),
                            record.entity
                        )));
                    }
                    (
                        ConflictResolution::Manual,
                        Some(edited.with_updated_at(now_ms)),
                    )
                }
            };

            record.resolution = resolution;
            record.resolved_by = Some(operator.to_string());
            record.resolved_at_ms = Some(now_ms);
            write
        };

        // The store lock is taken only after the conflict tables are
        // released; lock order stays one-way with the dedup engine.
        if let Some(payload) = write {
            self.store.write().replace_record(payload, self.bucket);
        }
        info!(conflict = id, operator, "conflict resolved");
        Ok(())
    }

    /// Looks up one conflict record.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<ConflictRecord> {
        self.tables.lock().records.get(&id).cloned()
    }

    /// All conflicts still awaiting adjudication, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<ConflictRecord> {
        self.tables
            .lock()
            .records
            .values()
            .filter(|r| r.resolution == ConflictResolution::Pending)
            .cloned()
            .collect()
    }

    /// Total number of conflict records, resolved included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.lock().records.len()
    }

    /// Returns true if no conflicts were ever raised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.lock().records.is_empty()
    }
}

/// One disagreement is identified by entity, source replica and the
/// exact snapshot pair.
fn dedup_key(detail: &ConflictDetail, source: DeviceId) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(detail.entity.as_bytes());
    hasher.update(source.as_bytes());
    hasher.update(to_cbor(&detail.hub_snapshot).unwrap_or_default());
    hasher.update(to_cbor(&detail.incoming_snapshot).unwrap_or_default());
    hasher.finalize().into()
}
