//! # Regatta Sync Engine
//!
//! Device-side synchronization for Regatta Sync.
//!
//! This crate provides:
//! - The durable outbound sync queue with per-record status
//! - The dependency-ordered sync orchestrator
//! - A fixed-ladder retry schedule for transient failures
//! - The device's local reference-data copy
//! - File-backed device state that survives restarts
//! - A periodic background drain scheduler
//!
//! ## Architecture
//!
//! A record created or modified on the device is enqueued, then
//! transferred by the orchestrator in the fixed dependency order of the
//! entity graph. Each record's outcome comes back individually, so the
//! queue always knows exactly which records the hub holds — a dropped
//! response is retried and resolves as `already-synced` on the hub.
//!
//! ## Key Invariants
//!
//! - Every queue entry's terminal state is `Synced`, `Conflict` or
//!   `Failed`; no record is ever dropped silently
//! - Kinds are uploaded in dependency-rank order
//! - A drain pass is resumable: acknowledged chunks are durable before
//!   the next chunk is submitted
//! - Conflicted entries stay out of automatic retry until released

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod orchestrator;
mod queue;
mod reference;
mod scheduler;
mod store;
mod transport;

pub use config::{EngineConfig, RetrySchedule};
pub use error::{EngineError, EngineResult};
pub use orchestrator::{DrainReport, SyncOrchestrator};
pub use queue::{QueueEntry, QueueSnapshot, QueueStats, SyncQueue, SyncStatus};
pub use reference::{ReferenceSnapshot, ReferenceStore};
pub use scheduler::{spawn_scheduler, SchedulerHandle};
pub use store::{DeviceSnapshot, DeviceStateStore};
pub use transport::{MockTransport, SyncTransport};

/// Current time as Unix milliseconds.
#[must_use]
pub fn unix_now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
