//! Dependency-ordered batch transfer.
//!
//! The orchestrator groups queued records by entity kind, transmits
//! them in the fixed topological order of the foreign-key graph, and
//! applies per-record outcomes as each chunk is acknowledged. Queue
//! state is persisted after every acknowledged chunk, so a crash or
//! network drop mid-drain leaves acknowledged records `Synced` and the
//! rest `Pending` — a restart continues where the drain stopped without
//! assuming request atomicity across the whole batch.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::queue::{QueueEntry, QueueStats, SyncQueue};
use crate::reference::ReferenceStore;
use crate::store::{DeviceSnapshot, DeviceStateStore};
use crate::transport::SyncTransport;
use parking_lot::Mutex;
use regatta_sync_protocol::{DownloadRequest, RecordOutcome, UploadRequest};
use regatta_types::{EntityKind, LocalId, RecordPayload, SyncId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Summary of one drain pass.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Records submitted this pass.
    pub attempted: usize,
    /// Entries that reached `Synced` (including merged records).
    pub synced: usize,
    /// Of those, records folded into a surviving case on the hub.
    pub merged: usize,
    /// Entries that entered `Conflict`.
    pub conflicts: usize,
    /// Entries left `Pending` on a missing dependency.
    pub dependency_missing: usize,
    /// Entries rejected as malformed.
    pub rejected: usize,
    /// Entries penalized for a transient transport failure.
    pub transient_failures: usize,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
}

impl DrainReport {
    /// Returns true when nothing needs operator attention or a retry.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts == 0 && self.rejected == 0 && self.transient_failures == 0
    }
}

/// Drives sync for one device.
pub struct SyncOrchestrator<T: SyncTransport> {
    config: EngineConfig,
    transport: Arc<T>,
    queue: Mutex<SyncQueue>,
    references: Mutex<ReferenceStore>,
    store: Option<DeviceStateStore>,
}

impl<T: SyncTransport> SyncOrchestrator<T> {
    /// Creates an orchestrator with in-memory state only.
    pub fn new(config: EngineConfig, transport: T) -> Self {
        let queue = SyncQueue::new(config.retry.clone());
        Self {
            config,
            transport: Arc::new(transport),
            queue: Mutex::new(queue),
            references: Mutex::new(ReferenceStore::new()),
            store: None,
        }
    }

    /// Creates an orchestrator backed by a durable state store,
    /// restoring any persisted queue and reference data.
    pub fn with_store(
        config: EngineConfig,
        transport: T,
        store: DeviceStateStore,
    ) -> EngineResult<Self> {
        let (queue, references) = match store.load()? {
            Some(snapshot) => {
                info!(
                    entries = snapshot.queue.entries.len(),
                    references = snapshot.references.entries.len(),
                    "restored device state"
                );
                (
                    SyncQueue::from_snapshot(config.retry.clone(), snapshot.queue),
                    ReferenceStore::from_snapshot(snapshot.references),
                )
            }
            None => (
                SyncQueue::new(config.retry.clone()),
                ReferenceStore::new(),
            ),
        };
        Ok(Self {
            config,
            transport: Arc::new(transport),
            queue: Mutex::new(queue),
            references: Mutex::new(references),
            store: Some(store),
        })
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Queues a locally created or modified record for transfer.
    pub fn enqueue(&self, payload: RecordPayload, now_ms: u64) -> EngineResult<()> {
        self.queue.lock().enqueue(payload, now_ms);
        self.persist()
    }

    /// Downloads the reference graph for one competition and applies it
    /// to the local reference store. Returns the number of new records.
    pub fn download_reference_data(&self, competition: SyncId) -> EngineResult<usize> {
        let request = DownloadRequest {
            device: self.config.device_id,
            token: self.config.auth_token.clone(),
            competition,
        };
        let response = self.transport.download(&request)?;
        let added = self.references.lock().apply_graph(&response.graph);
        info!(competition = %competition, added, "applied reference graph");
        self.persist()?;
        Ok(added)
    }

    /// Runs one drain pass over every drainable entry.
    ///
    /// Kinds are processed strictly in dependency order; within a kind,
    /// entries go out in queue order, chunked to the configured upload
    /// size. A retryable transport failure penalizes the affected chunk
    /// and aborts the pass (the hub is unreachable); everything not yet
    /// submitted stays `Pending` untouched.
    pub fn drain(&self, now_ms: u64) -> EngineResult<DrainReport> {
        let start = Instant::now();
        let mut report = DrainReport::default();

        let drainable = self.queue.lock().drainable(now_ms);
        if drainable.is_empty() {
            report.duration = start.elapsed();
            return Ok(report);
        }
        debug!(entries = drainable.len(), "drain pass started");

        'kinds: for kind in EntityKind::ALL {
            let batch: Vec<&QueueEntry> =
                drainable.iter().filter(|e| e.payload.kind() == kind).collect();
            if batch.is_empty() {
                continue;
            }

            for chunk in batch.chunks(self.config.upload_chunk_size) {
                let records: Vec<RecordPayload> =
                    chunk.iter().map(|e| e.payload.clone()).collect();
                report.attempted += records.len();

                let request = UploadRequest::new(
                    self.config.device_id,
                    self.config.auth_token.clone(),
                    kind,
                    records,
                );

                match self.transport.upload(&request) {
                    Ok(response) => {
                        if response.outcomes.len() != chunk.len() {
                            return Err(EngineError::OutcomeMismatch {
                                sent: chunk.len(),
                                got: response.outcomes.len(),
                            });
                        }
                        let mut queue = self.queue.lock();
                        for (entry, outcome) in chunk.iter().zip(&response.outcomes) {
                            queue.mark(entry.sync_id(), outcome, now_ms)?;
                            match outcome {
                                RecordOutcome::Created | RecordOutcome::AlreadySynced => {
                                    report.synced += 1;
                                }
                                RecordOutcome::Merged { .. } => {
                                    report.synced += 1;
                                    report.merged += 1;
                                }
                                RecordOutcome::Conflict { .. } => report.conflicts += 1,
                                RecordOutcome::DependencyMissing { .. } => {
                                    report.dependency_missing += 1;
                                }
                                RecordOutcome::Rejected { .. } => report.rejected += 1,
                            }
                        }
                        drop(queue);
                        // Acknowledged work becomes durable before the
                        // next chunk goes out.
                        self.persist()?;
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(kind = %kind, error = %e, "transient upload failure, aborting pass");
                        let message = e.to_string();
                        let mut queue = self.queue.lock();
                        for entry in chunk {
                            queue.record_transient_failure(entry.sync_id(), &message, now_ms)?;
                        }
                        report.transient_failures += chunk.len();
                        drop(queue);
                        self.persist()?;
                        break 'kinds;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        report.duration = start.elapsed();
        info!(
            attempted = report.attempted,
            synced = report.synced,
            conflicts = report.conflicts,
            "drain pass finished"
        );
        Ok(report)
    }

    /// Releases a conflicted entry for retry after hub-side resolution.
    pub fn release_conflict(&self, id: SyncId, now_ms: u64) -> EngineResult<()> {
        self.queue.lock().release_conflict(id, now_ms)?;
        self.persist()
    }

    /// Resets a failed entry for another round of attempts.
    pub fn manual_retry(&self, id: SyncId, now_ms: u64) -> EngineResult<()> {
        self.queue.lock().manual_retry(id, now_ms)?;
        self.persist()
    }

    /// Removes synced entries from the queue (explicit cleanup).
    pub fn remove_synced(&self) -> EngineResult<usize> {
        let removed = self.queue.lock().remove_synced();
        self.persist()?;
        Ok(removed)
    }

    /// Clears queue, reference copy and persisted state for the next
    /// event. Operator-triggered only.
    pub fn clear_for_next_event(&self) -> EngineResult<()> {
        {
            let mut queue = self.queue.lock();
            *queue = SyncQueue::new(self.config.retry.clone());
        }
        self.references.lock().clear();
        if let Some(store) = &self.store {
            store.clear_for_next_event()?;
        }
        Ok(())
    }

    /// Per-status queue counts.
    #[must_use]
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.lock().stats()
    }

    /// Looks up one queue entry.
    #[must_use]
    pub fn queue_entry(&self, id: SyncId) -> Option<QueueEntry> {
        self.queue.lock().get(id).cloned()
    }

    /// Resolves a sync ID against the local reference copy.
    #[must_use]
    pub fn local_id(&self, id: SyncId) -> Option<LocalId> {
        self.references.lock().local_id(id)
    }

    /// Number of reference records held locally.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.references.lock().len()
    }

    fn persist(&self) -> EngineResult<()> {
        if let Some(store) = &self.store {
            let snapshot = DeviceSnapshot {
                queue: self.queue.lock().snapshot(),
                references: self.references.lock().snapshot(),
            };
            store.save(&snapshot)?;
        }
        Ok(())
    }
}
