//! Per-record upload outcomes.

use crate::conflict::ConflictDetail;
use regatta_types::SyncId;
use serde::{Deserialize, Serialize};

/// The hub's decision for one uploaded record.
///
/// An upload response carries one outcome per submitted record, in the
/// same order, so the device can update its queue entry by entry.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// The record was committed as new.
    Created,
    /// An equivalent record already exists; the submission was a no-op.
    AlreadySynced,
    /// The record described an already-known event and was folded into
    /// the surviving case.
    Merged {
        /// The case that survived the merge.
        surviving: SyncId,
    },
    /// The hub refuses to pick a side; an operator must adjudicate.
    Conflict {
        /// Both snapshots plus the detected conflict kind.
        detail: ConflictDetail,
    },
    /// A referenced record has not reached the hub yet. The submission
    /// should stay queued and be retried once the dependency syncs.
    DependencyMissing {
        /// The unresolved reference.
        missing: SyncId,
    },
    /// The record is malformed and will never be accepted as-is.
    Rejected {
        /// Why the record was refused.
        reason: String,
    },
}

impl RecordOutcome {
    /// Returns true when the record is durably represented on the hub
    /// (created, already present, or merged into a survivor).
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            RecordOutcome::Created | RecordOutcome::AlreadySynced | RecordOutcome::Merged { .. }
        )
    }

    /// Returns the stable wire name of this outcome.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RecordOutcome::Created => "created",
            RecordOutcome::AlreadySynced => "already_synced",
            RecordOutcome::Merged { .. } => "merged",
            RecordOutcome::Conflict { .. } => "conflict",
            RecordOutcome::DependencyMissing { .. } => "dependency_missing",
            RecordOutcome::Rejected { .. } => "rejected",
        }
    }
}
