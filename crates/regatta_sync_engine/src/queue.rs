//! The durable, per-record outbound sync queue.
//!
//! The queue is an explicit, inspectable ordered set: draining order is
//! keyed by (dependency rank, enqueue time, sequence) and tested as a
//! contract, never left to storage iteration order.

use crate::config::RetrySchedule;
use crate::error::{EngineError, EngineResult};
use regatta_sync_protocol::RecordOutcome;
use regatta_types::{RecordPayload, SyncId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Status of a queue entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Waiting to be transferred (or to be retried).
    Pending,
    /// Confirmed on the hub.
    Synced,
    /// The hub reported a disagreement; excluded from automatic retry
    /// until an operator resolves it.
    Conflict,
    /// Retry budget exhausted or record rejected; needs operator
    /// intervention.
    Failed,
}

/// One queued record with its transfer state.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct QueueEntry {
    /// The record to transfer. Re-enqueueing replaces this in place.
    pub payload: RecordPayload,
    /// Current status.
    pub status: SyncStatus,
    /// Transient failures so far.
    pub retry_count: u32,
    /// Last error reported for this entry.
    pub last_error: Option<String>,
    /// When the entry was first enqueued (Unix millis).
    pub enqueued_at_ms: u64,
    /// Earliest time the entry may be transferred again (Unix millis).
    pub next_attempt_at_ms: u64,
    /// Insertion sequence, breaks ties within one millisecond.
    pub sequence: u64,
    /// When the hub merged this record away, the surviving case.
    pub surviving_id: Option<SyncId>,
}

impl QueueEntry {
    /// The record's replica-independent identifier.
    #[must_use]
    pub fn sync_id(&self) -> SyncId {
        self.payload.sync_id()
    }
}

/// Counts of entries per status.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct QueueStats {
    /// Entries waiting for transfer.
    pub pending: usize,
    /// Entries confirmed on the hub.
    pub synced: usize,
    /// Entries awaiting operator adjudication.
    pub conflict: usize,
    /// Entries that exhausted their retry budget or were rejected.
    pub failed: usize,
}

/// Serializable queue state for the device state store.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// All entries.
    pub entries: Vec<QueueEntry>,
    /// Next insertion sequence.
    pub next_sequence: u64,
}

/// The device-side outbound queue.
pub struct SyncQueue {
    schedule: RetrySchedule,
    entries: HashMap<SyncId, QueueEntry>,
    next_sequence: u64,
}

impl SyncQueue {
    /// Creates an empty queue with the given retry schedule.
    pub fn new(schedule: RetrySchedule) -> Self {
        Self {
            schedule,
            entries: HashMap::new(),
            next_sequence: 0,
        }
    }

    /// Restores a queue from a snapshot.
    pub fn from_snapshot(schedule: RetrySchedule, snapshot: QueueSnapshot) -> Self {
        let entries = snapshot
            .entries
            .into_iter()
            .map(|e| (e.sync_id(), e))
            .collect();
        Self {
            schedule,
            entries,
            next_sequence: snapshot.next_sequence,
        }
    }

    /// Returns a serializable snapshot of the queue.
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        let mut entries: Vec<QueueEntry> = self.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.sequence);
        QueueSnapshot {
            entries,
            next_sequence: self.next_sequence,
        }
    }

    /// Appends a `Pending` entry for a created or modified record.
    ///
    /// Enqueueing is idempotent on the record's sync ID: an existing
    /// entry has its payload replaced rather than being duplicated. A
    /// `Synced` or `Failed` entry returns to `Pending` (the record was
    /// modified again); a `Conflict` entry keeps its status — it stays
    /// out of automatic retry until explicitly released.
    pub fn enqueue(&mut self, payload: RecordPayload, now_ms: u64) {
        let id = payload.sync_id();
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.payload = payload;
                if entry.status != SyncStatus::Conflict {
                    entry.status = SyncStatus::Pending;
                    entry.retry_count = 0;
                    entry.next_attempt_at_ms = now_ms;
                    entry.last_error = None;
                }
            }
            None => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                self.entries.insert(
                    id,
                    QueueEntry {
                        payload,
                        status: SyncStatus::Pending,
                        retry_count: 0,
                        last_error: None,
                        enqueued_at_ms: now_ms,
                        next_attempt_at_ms: now_ms,
                        sequence,
                        surviving_id: None,
                    },
                );
            }
        }
    }

    /// Returns the entries eligible for transfer at `now_ms`, ordered
    /// by (dependency rank, enqueue time, sequence).
    ///
    /// Eligible means `Pending` or `Failed` with a retry count below
    /// the schedule's maximum, whose backoff delay has elapsed.
    #[must_use]
    pub fn drainable(&self, now_ms: u64) -> Vec<QueueEntry> {
        let mut eligible: Vec<QueueEntry> = self
            .entries
            .values()
            .filter(|e| matches!(e.status, SyncStatus::Pending | SyncStatus::Failed))
            .filter(|e| e.retry_count < self.schedule.max_attempts)
            .filter(|e| e.next_attempt_at_ms <= now_ms)
            .cloned()
            .collect();
        eligible.sort_by_key(|e| {
            (
                e.payload.kind().dependency_rank(),
                e.enqueued_at_ms,
                e.sequence,
            )
        });
        eligible
    }

    /// Applies the hub's outcome for one record.
    ///
    /// Unknown identifiers are a programming error and return
    /// [`EngineError::UnknownEntry`].
    pub fn mark(&mut self, id: SyncId, outcome: &RecordOutcome, now_ms: u64) -> EngineResult<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(EngineError::UnknownEntry(id))?;

        match outcome {
            RecordOutcome::Created | RecordOutcome::AlreadySynced => {
                entry.status = SyncStatus::Synced;
                entry.last_error = None;
            }
            RecordOutcome::Merged { surviving } => {
                entry.status = SyncStatus::Synced;
                entry.surviving_id = Some(*surviving);
                entry.last_error = None;
                debug!(entity = %id, surviving = %surviving, "record merged on hub");
            }
            RecordOutcome::Conflict { detail } => {
                entry.status = SyncStatus::Conflict;
                entry.last_error = Some(format!("{:?} on {}", detail.kind, detail.entity_kind));
            }
            RecordOutcome::DependencyMissing { missing } => {
                // Expected to self-resolve; stays pending with no
                // retry-budget penalty and no backoff delay.
                entry.status = SyncStatus::Pending;
                entry.next_attempt_at_ms = now_ms;
                entry.last_error = Some(format!("waiting for dependency {missing}"));
            }
            RecordOutcome::Rejected { reason } => {
                entry.status = SyncStatus::Failed;
                entry.retry_count = self.schedule.max_attempts;
                entry.last_error = Some(reason.clone());
            }
        }
        Ok(())
    }

    /// Records a transient transfer failure for one entry, applying
    /// the backoff schedule. Exhausting the budget parks the entry as
    /// `Failed`.
    pub fn record_transient_failure(
        &mut self,
        id: SyncId,
        error: &str,
        now_ms: u64,
    ) -> EngineResult<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(EngineError::UnknownEntry(id))?;

        entry.retry_count += 1;
        entry.last_error = Some(error.to_string());
        let delay = self.schedule.delay_for_attempt(entry.retry_count);
        entry.next_attempt_at_ms = now_ms + delay.as_millis() as u64;
        if entry.retry_count >= self.schedule.max_attempts {
            entry.status = SyncStatus::Failed;
            debug!(entity = %id, "retry budget exhausted");
        }
        Ok(())
    }

    /// Releases a `Conflict` entry back to `Pending` after the hub-side
    /// conflict was resolved. The entry is expected to reach `Synced`
    /// on the next pass.
    pub fn release_conflict(&mut self, id: SyncId, now_ms: u64) -> EngineResult<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(EngineError::UnknownEntry(id))?;
        if entry.status != SyncStatus::Conflict {
            return Err(EngineError::WrongState {
                id,
                expected: "conflict",
            });
        }
        entry.status = SyncStatus::Pending;
        entry.retry_count = 0;
        entry.next_attempt_at_ms = now_ms;
        Ok(())
    }

    /// Resets a `Failed` entry for another round of attempts. An
    /// operator action, never automatic.
    pub fn manual_retry(&mut self, id: SyncId, now_ms: u64) -> EngineResult<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(EngineError::UnknownEntry(id))?;
        if entry.status != SyncStatus::Failed {
            return Err(EngineError::WrongState {
                id,
                expected: "failed",
            });
        }
        entry.status = SyncStatus::Pending;
        entry.retry_count = 0;
        entry.next_attempt_at_ms = now_ms;
        entry.last_error = None;
        Ok(())
    }

    /// Removes all `Synced` entries and returns how many were removed.
    ///
    /// This is the explicit post-sync cleanup step; entries are never
    /// removed implicitly.
    pub fn remove_synced(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.status != SyncStatus::Synced);
        before - self.entries.len()
    }

    /// Looks up one entry.
    #[must_use]
    pub fn get(&self, id: SyncId) -> Option<&QueueEntry> {
        self.entries.get(&id)
    }

    /// Number of entries, across all statuses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the queue holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counts entries per status.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for entry in self.entries.values() {
            match entry.status {
                SyncStatus::Pending => stats.pending += 1,
                SyncStatus::Synced => stats.synced += 1,
                SyncStatus::Conflict => stats.conflict += 1,
                SyncStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}
