//! Durable device-local state.
//!
//! The sync queue and the device's copy of reference data must survive
//! process restarts. State is one CBOR file, written to a temporary
//! sibling and renamed into place so a crash mid-write never corrupts
//! the previous snapshot. An exclusive lock file keeps two processes
//! from sharing the same state directory.

use crate::error::{EngineError, EngineResult};
use crate::queue::QueueSnapshot;
use crate::reference::ReferenceSnapshot;
use fs2::FileExt;
use regatta_sync_protocol::{from_cbor, to_cbor};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const STATE_FILE: &str = "device_state.cbor";
const LOCK_FILE: &str = "device_state.lock";

/// The persisted device state: queue plus reference copy.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Outbound queue state.
    pub queue: QueueSnapshot,
    /// Downloaded reference data.
    pub references: ReferenceSnapshot,
}

/// File-backed store for device state.
pub struct DeviceStateStore {
    dir: PathBuf,
    _lock: File,
}

impl DeviceStateStore {
    /// Opens the store in the given directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or if
    /// another process already holds the state lock.
    pub fn open(dir: &Path) -> EngineResult<Self> {
        std::fs::create_dir_all(dir)?;
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        lock.try_lock_exclusive().map_err(|_| {
            EngineError::State(format!(
                "device state at {} is locked by another process",
                dir.display()
            ))
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
        })
    }

    /// Returns the state directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads the persisted snapshot, or `None` on first run.
    pub fn load(&self) -> EngineResult<Option<DeviceSnapshot>> {
        let path = self.dir.join(STATE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        let snapshot = from_cbor(&bytes)
            .map_err(|e| EngineError::State(format!("corrupt device state: {e}")))?;
        Ok(Some(snapshot))
    }

    /// Persists a snapshot atomically (write to a temporary file, sync,
    /// rename into place).
    pub fn save(&self, snapshot: &DeviceSnapshot) -> EngineResult<()> {
        let bytes = to_cbor(snapshot)?;
        let path = self.dir.join(STATE_FILE);
        let tmp = self.dir.join(format!("{STATE_FILE}.tmp"));

        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Deletes the persisted state. The explicit, operator-triggered
    /// "clear for next event" action; never called automatically.
    pub fn clear_for_next_event(&self) -> EngineResult<()> {
        let path = self.dir.join(STATE_FILE);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        info!(dir = %self.dir.display(), "device state cleared for next event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrySchedule;
    use crate::queue::SyncQueue;
    use crate::reference::ReferenceStore;
    use regatta_types::{CaseDecision, DeviceId, IncidentCase, RecordPayload, SyncId};
    use tempfile::TempDir;

    fn sample_snapshot() -> DeviceSnapshot {
        let mut queue = SyncQueue::new(RetrySchedule::immediate());
        queue.enqueue(
            RecordPayload::Case(IncidentCase {
                sync_id: SyncId::from_bytes([7u8; 16]),
                race: SyncId::from_bytes([1u8; 16]),
                location: SyncId::from_bytes([2u8; 16]),
                bib_number: 42,
                decision: CaseDecision::Open,
                notes: String::new(),
                created_at_ms: 1,
                updated_at_ms: 1,
                created_by: DeviceId::from_bytes([9u8; 16]),
            }),
            1,
        );
        DeviceSnapshot {
            queue: queue.snapshot(),
            references: ReferenceStore::new().snapshot(),
        }
    }

    #[test]
    fn first_run_has_no_state() {
        let dir = TempDir::new().unwrap();
        let store = DeviceStateStore::open(dir.path()).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let snapshot = sample_snapshot();
        {
            let store = DeviceStateStore::open(dir.path()).unwrap();
            store.save(&snapshot).unwrap();
        }
        // A new process (new store) sees the persisted state.
        let store = DeviceStateStore::open(dir.path()).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = DeviceStateStore::open(dir.path()).unwrap();
        store.save(&sample_snapshot()).unwrap();

        let empty = DeviceSnapshot {
            queue: SyncQueue::new(RetrySchedule::immediate()).snapshot(),
            references: ReferenceStore::new().snapshot(),
        };
        store.save(&empty).unwrap();
        assert_eq!(store.load().unwrap(), Some(empty));
    }

    #[test]
    fn clear_for_next_event_removes_state() {
        let dir = TempDir::new().unwrap();
        let store = DeviceStateStore::open(dir.path()).unwrap();
        store.save(&sample_snapshot()).unwrap();
        store.clear_for_next_event().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine.
        store.clear_for_next_event().unwrap();
    }

    #[test]
    fn second_open_is_refused_while_locked() {
        let dir = TempDir::new().unwrap();
        let _store = DeviceStateStore::open(dir.path()).unwrap();
        assert!(matches!(
            DeviceStateStore::open(dir.path()),
            Err(EngineError::State(_))
        ));
    }
}
