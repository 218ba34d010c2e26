//! The three-layer deduplication engine.
//!
//! Each incoming record is classified by three layers, in order,
//! short-circuiting on the first that reaches a decision:
//!
//! 1. **Identity** — a committed record with the same sync ID. Equal
//!    content (modulo volatile fields) is `already-synced`, which makes
//!    at-least-once delivery safe: a device that lost an acknowledgment
//!    simply resubmits. Differing content is never overwritten
//!    silently; it raises a conflict.
//! 2. **Fingerprint** — for cases only: an existing, not-merged-away
//!    case with the same content fingerprint means both records
//!    describe the same real-world event. The incoming shell is
//!    discarded, its identifier aliased to the survivor, and an
//!    auditable merge note recorded. No operator attention needed.
//! 3. **New** — otherwise the record commits as created, provided every
//!    reference it carries is resolvable.
//!
//! The whole decision for one record runs under the hub store's write
//! guard, so decisions per identifier are serialized.

use crate::conflicts::ConflictStore;
use crate::store::{HubState, HubStore};
use regatta_sync_protocol::{ConflictDetail, ConflictKind, RecordOutcome};
use regatta_types::{DeviceId, Fingerprint, RecordPayload};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Classifies and commits incoming records.
pub struct DedupEngine {
    store: Arc<HubStore>,
    conflicts: Arc<ConflictStore>,
    bucket: Duration,
}

impl DedupEngine {
    /// Creates an engine over the given store and conflict store.
    pub fn new(store: Arc<HubStore>, conflicts: Arc<ConflictStore>, bucket: Duration) -> Self {
        Self {
            store,
            conflicts,
            bucket,
        }
    }

    /// The configured fingerprint bucket width.
    #[must_use]
    pub fn bucket(&self) -> Duration {
        self.bucket
    }

    /// Processes one incoming record from `source`, committing it or
    /// reporting why not.
    ///
    /// Replaying the same submission any number of times converges to
    /// exactly one stored entity and is never rejected outright.
    pub fn process(
        &self,
        incoming: &RecordPayload,
        source: DeviceId,
        now_ms: u64,
    ) -> RecordOutcome {
        let (outcome, raise) = {
            let mut state = self.store.write();
            self.decide(&mut state, incoming, source, now_ms)
        };
        // The conflict store has its own lock; raise outside the store
        // guard to keep lock order one-way.
        if let Some(detail) = raise {
            self.conflicts.raise(&detail, source, now_ms);
        }
        outcome
    }

    fn decide(
        &self,
        state: &mut HubState,
        incoming: &RecordPayload,
        source: DeviceId,
        now_ms: u64,
    ) -> (RecordOutcome, Option<ConflictDetail>) {
        // Canonicalize a report's parent through the merge alias map,
        // re-parenting it onto the surviving case.
        let incoming = match incoming {
            RecordPayload::Report(report) => match state.resolve_case(report.case) {
                Some(target) if target != report.case => {
                    let mut reparented = report.clone();
                    reparented.case = target;
                    RecordPayload::Report(reparented)
                }
                Some(_) => incoming.clone(),
                None => {
                    return (
                        RecordOutcome::DependencyMissing {
                            missing: report.case,
                        },
                        None,
                    )
                }
            },
            _ => incoming.clone(),
        };
        let id = incoming.sync_id();

        // A case shell that was already merged away: resubmission after
        // a dropped acknowledgment converges on the same outcome.
        if matches!(incoming, RecordPayload::Case(_)) && !state.contains(id) {
            if let Some(surviving) = state.alias_of(id) {
                return (RecordOutcome::Merged { surviving }, None);
            }
        }

        // Layer 1: identity.
        if let Some(existing) = state.get(id).cloned() {
            if existing.content_eq(&incoming) {
                debug!(entity = %id, "identical resubmission");
                return (RecordOutcome::AlreadySynced, None);
            }
            let kind = conflict_kind(&existing, &incoming);
            let detail = ConflictDetail {
                kind,
                entity_kind: incoming.kind(),
                entity: id,
                hub_snapshot: existing,
                incoming_snapshot: incoming,
            };
            return (
                RecordOutcome::Conflict {
                    detail: detail.clone(),
                },
                Some(detail),
            );
        }

        // Every reference must resolve before the record can commit.
        for reference in incoming.references() {
            if !state.contains(reference) {
                return (
                    RecordOutcome::DependencyMissing { missing: reference },
                    None,
                );
            }
        }

        // Layer 2: fingerprint, cases only.
        if let RecordPayload::Case(case) = &incoming {
            let fingerprint = Fingerprint::of_case(case, self.bucket);
            if let Some(surviving) = state.case_by_fingerprint(fingerprint) {
                state.merge_case(case.sync_id, surviving, source, now_ms);
                return (RecordOutcome::Merged { surviving }, None);
            }
            state.insert_case(case.clone(), fingerprint);
            return (RecordOutcome::Created, None);
        }

        // Layer 3: accept as newly created.
        match incoming {
            RecordPayload::Report(report) => state.insert_report(report),
            other => state.insert_reference(other),
        }
        (RecordOutcome::Created, None)
    }
}

/// Picks the conflict kind for an identity mismatch: contradictory
/// decisions on a decided case escalate to `DecisionMismatch`.
fn conflict_kind(existing: &RecordPayload, incoming: &RecordPayload) -> ConflictKind {
    match (existing.decision(), incoming.decision()) {
        (Some(hub), Some(device))
            if hub.is_decided() && device.is_decided() && hub != device =>
        {
            ConflictKind::DecisionMismatch
        }
        _ => ConflictKind::IdentityMismatch,
    }
}
