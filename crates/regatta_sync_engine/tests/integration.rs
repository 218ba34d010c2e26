//! End-to-end tests: device engine against an in-process hub.

use regatta_sync_engine::{
    DeviceStateStore, EngineConfig, RetrySchedule, SyncOrchestrator, SyncStatus,
};
use regatta_sync_protocol::{RecordOutcome, UploadRequest};
use regatta_sync_server::{HubConfig, HubServer, ResolutionAction};
use regatta_testkit::{init_test_logging, EventFixture, LoopbackTransport};
use regatta_types::{CaseDecision, DeviceId, EntityKind, RecordPayload, SyncId};
use std::sync::Arc;

// 10:32:10 and 10:32:25 as milliseconds since midnight; both fall into
// the same 30-second bucket.
const T_10_32_10: u64 = 37_930_000;
const T_10_32_25: u64 = 37_945_000;

struct Device {
    id: DeviceId,
    orchestrator: SyncOrchestrator<LoopbackTransport>,
}

fn device(hub: &Arc<HubServer>, name: &str) -> Device {
    let id = DeviceId::new();
    hub.register_device(id, name);
    let token = hub.issue_token(id).unwrap();
    let config = EngineConfig::new(id, "loopback://hub")
        .with_auth_token(token)
        .with_retry(RetrySchedule::immediate());
    let orchestrator = SyncOrchestrator::new(config, LoopbackTransport::new(Arc::clone(hub)));
    Device { id, orchestrator }
}

#[test]
fn full_sync_round_trip_with_auth() {
    init_test_logging();
    let fixture = EventFixture::new();
    let hub = Arc::new(HubServer::new(HubConfig::new().with_auth(b"hub-secret".to_vec())));
    fixture.seed(&hub);

    let device = device(&hub, "Finish tower");
    let downloaded = device
        .orchestrator
        .download_reference_data(fixture.competition.sync_id)
        .unwrap();
    assert_eq!(downloaded, 11);
    assert!(device.orchestrator.local_id(fixture.race.sync_id).is_some());

    let case = fixture.case("L1", 42, T_10_32_10, device.id);
    let case_id = case.sync_id;
    let report = EventFixture::report(case_id, T_10_32_10, "missed gate 14", device.id);

    device
        .orchestrator
        .enqueue(RecordPayload::Case(case), T_10_32_10)
        .unwrap();
    device
        .orchestrator
        .enqueue(RecordPayload::Report(report), T_10_32_10)
        .unwrap();

    let drain = device.orchestrator.drain(T_10_32_25).unwrap();
    assert_eq!(drain.attempted, 2);
    assert_eq!(drain.synced, 2);
    assert!(drain.is_clean());

    assert!(hub.record(case_id).is_some());
    assert_eq!(hub.reports_of(case_id).len(), 1);

    // Explicit cleanup removes the synced entries, nothing else does.
    assert_eq!(device.orchestrator.queue_stats().synced, 2);
    assert_eq!(device.orchestrator.remove_synced().unwrap(), 2);
}

#[test]
fn idempotent_resubmission_yields_one_entity() {
    init_test_logging();
    let fixture = EventFixture::new();
    let hub = Arc::new(HubServer::new(HubConfig::new()));
    fixture.seed(&hub);
    let device_id = DeviceId::new();
    hub.register_device(device_id, "Tower");
    let transport = LoopbackTransport::new(Arc::clone(&hub));

    use regatta_sync_engine::SyncTransport;

    let case = fixture.case("L1", 42, T_10_32_10, device_id);
    let request = UploadRequest::new(
        device_id,
        Vec::new(),
        EntityKind::Case,
        vec![RecordPayload::Case(case)],
    );

    let records_before = hub.record_count();
    let mut outcomes = Vec::new();
    for _ in 0..4 {
        let response = transport.upload(&request).unwrap();
        outcomes.push(response.outcomes[0].clone());
    }

    assert_eq!(outcomes[0], RecordOutcome::Created);
    assert!(outcomes[1..]
        .iter()
        .all(|o| *o == RecordOutcome::AlreadySynced));
    assert_eq!(hub.record_count(), records_before + 1);
}

#[test]
fn dependency_ordering_self_resolves() {
    init_test_logging();
    let fixture = EventFixture::new();
    let hub = Arc::new(HubServer::new(HubConfig::new()));
    fixture.seed(&hub);
    let device = device(&hub, "Gate 14");

    let case = fixture.case("L1", 42, T_10_32_10, device.id);
    let case_id = case.sync_id;
    let report = EventFixture::report(case_id, T_10_32_10, "paddle touch", device.id);
    let report_id = report.sync_id;

    // The report reaches the queue while its case is still unqueued.
    device
        .orchestrator
        .enqueue(RecordPayload::Report(report), 1_000)
        .unwrap();
    let drain = device.orchestrator.drain(2_000).unwrap();
    assert_eq!(drain.dependency_missing, 1);
    assert_eq!(drain.synced, 0);

    // Not lost, not failed: still pending with no retry penalty.
    let entry = device.orchestrator.queue_entry(report_id).unwrap();
    assert_eq!(entry.status, SyncStatus::Pending);
    assert_eq!(entry.retry_count, 0);

    // Once the case is queued, the next pass syncs both, case first,
    // with no manual action.
    device
        .orchestrator
        .enqueue(RecordPayload::Case(case), 3_000)
        .unwrap();
    let drain = device.orchestrator.drain(4_000).unwrap();
    assert_eq!(drain.synced, 2);

    assert_eq!(
        device.orchestrator.queue_entry(report_id).unwrap().status,
        SyncStatus::Synced
    );
    assert_eq!(hub.reports_of(case_id).len(), 1);
}

#[test]
fn resume_after_partial_failure() {
    init_test_logging();
    let fixture = EventFixture::new();
    let hub = Arc::new(HubServer::new(HubConfig::new()));
    fixture.seed(&hub);
    let device_id = DeviceId::new();
    hub.register_device(device_id, "Tower");

    let state_dir = tempfile::TempDir::new().unwrap();
    let config = EngineConfig::new(device_id, "loopback://hub")
        .with_retry(RetrySchedule::immediate())
        .with_upload_chunk_size(1);

    // Three distinct cases (different bibs, so no fingerprint merges).
    let cases: Vec<RecordPayload> = [41u32, 42, 43]
        .iter()
        .map(|bib| RecordPayload::Case(fixture.case("L1", *bib, T_10_32_10 + *bib as u64, device_id)))
        .collect();
    let ids: Vec<SyncId> = cases.iter().map(|c| c.sync_id()).collect();

    {
        let transport = LoopbackTransport::new(Arc::clone(&hub));
        // The connection drops after two of three chunks are
        // acknowledged.
        transport.fail_uploads_after(2);

        let store = DeviceStateStore::open(state_dir.path()).unwrap();
        let orchestrator =
            SyncOrchestrator::with_store(config.clone(), transport, store).unwrap();
        for (i, case) in cases.iter().enumerate() {
            orchestrator.enqueue(case.clone(), 1_000 + i as u64).unwrap();
        }

        let drain = orchestrator.drain(2_000).unwrap();
        assert_eq!(drain.synced, 2);
        assert_eq!(drain.transient_failures, 1);

        let stats = orchestrator.queue_stats();
        assert_eq!(stats.synced, 2);
        assert_eq!(stats.pending, 1);
        // The orchestrator is dropped here: the crash.
    }

    assert_eq!(hub.record_count(), 13); // 11 reference + 2 cases

    // A fresh process restores the persisted queue and completes the
    // remainder without re-creating the acknowledged records.
    let transport = LoopbackTransport::new(Arc::clone(&hub));
    let store = DeviceStateStore::open(state_dir.path()).unwrap();
    let orchestrator = SyncOrchestrator::with_store(config, transport, store).unwrap();

    let stats = orchestrator.queue_stats();
    assert_eq!(stats.synced, 2);
    assert_eq!(stats.pending, 1);

    let drain = orchestrator.drain(10_000).unwrap();
    assert_eq!(drain.attempted, 1);
    assert_eq!(drain.synced, 1);

    assert_eq!(hub.record_count(), 14);
    for id in ids {
        assert_eq!(
            orchestrator.queue_entry(id).unwrap().status,
            SyncStatus::Synced
        );
    }
}

#[test]
fn conflicting_decisions_surface_exactly_one_conflict() {
    init_test_logging();
    let fixture = EventFixture::new();
    let hub = Arc::new(HubServer::new(HubConfig::new()));
    fixture.seed(&hub);

    let device_a = device(&hub, "Tower A");
    let device_b = device(&hub, "Tower B");

    // The same case identifier, decided differently on two replicas.
    let mut case = fixture.case("L1", 42, T_10_32_10, device_a.id);
    case.decision = CaseDecision::NoAction;
    let case_id = case.sync_id;

    let mut contradicting = case.clone();
    contradicting.decision = CaseDecision::PenaltyApplied;
    contradicting.created_by = device_b.id;

    device_a
        .orchestrator
        .enqueue(RecordPayload::Case(case), 1_000)
        .unwrap();
    device_a.orchestrator.drain(2_000).unwrap();

    device_b
        .orchestrator
        .enqueue(RecordPayload::Case(contradicting.clone()), 3_000)
        .unwrap();
    let drain = device_b.orchestrator.drain(4_000).unwrap();
    assert_eq!(drain.conflicts, 1);

    // Exactly one conflict record, no silent overwrite in either
    // direction.
    assert_eq!(hub.pending_conflicts().len(), 1);
    assert_eq!(
        hub.record(case_id).unwrap().decision(),
        Some(CaseDecision::NoAction)
    );

    // The conflicted entry is out of automatic retry; resubmitting the
    // same disagreement accumulates nothing.
    assert_eq!(device_b.orchestrator.drain(5_000).unwrap().attempted, 0);
    assert_eq!(hub.pending_conflicts().len(), 1);

    // An operator sides with the device; after release the entry
    // reaches Synced through the identity layer.
    let conflict = &hub.pending_conflicts()[0];
    assert_eq!(conflict.source_device, device_b.id);
    hub.resolve_conflict(conflict.id, ResolutionAction::DeviceWins, "chief-judge")
        .unwrap();
    assert!(hub.pending_conflicts().is_empty());

    device_b
        .orchestrator
        .release_conflict(case_id, 6_000)
        .unwrap();
    let drain = device_b.orchestrator.drain(7_000).unwrap();
    assert_eq!(drain.synced, 1);
    assert_eq!(
        hub.record(case_id).unwrap().decision(),
        Some(CaseDecision::PenaltyApplied)
    );
}

#[test]
fn same_event_on_two_devices_merges_into_one_case() {
    init_test_logging();
    let fixture = EventFixture::new();
    let hub = Arc::new(HubServer::new(HubConfig::new()));
    fixture.seed(&hub);

    let device_a = device(&hub, "Tower A");
    let device_b = device(&hub, "Tower B");

    // Both devices capture participant 42 at L1, fifteen seconds apart.
    let case_a = fixture.case("L1", 42, T_10_32_10, device_a.id);
    let case_a_id = case_a.sync_id;
    let report_a = EventFixture::report(case_a_id, T_10_32_10, "hull contact", device_a.id);

    let case_b = fixture.case("L1", 42, T_10_32_25, device_b.id);
    let case_b_id = case_b.sync_id;
    let report_b = EventFixture::report(case_b_id, T_10_32_25, "seen from the bank", device_b.id);

    device_a
        .orchestrator
        .enqueue(RecordPayload::Case(case_a), T_10_32_10)
        .unwrap();
    device_a
        .orchestrator
        .enqueue(RecordPayload::Report(report_a), T_10_32_10)
        .unwrap();
    device_a.orchestrator.drain(T_10_32_25).unwrap();

    device_b
        .orchestrator
        .enqueue(RecordPayload::Case(case_b), T_10_32_25)
        .unwrap();
    device_b
        .orchestrator
        .enqueue(RecordPayload::Report(report_b), T_10_32_25)
        .unwrap();
    let drain = device_b.orchestrator.drain(T_10_32_25 + 1_000).unwrap();
    assert_eq!(drain.merged, 1);
    assert_eq!(drain.synced, 2);

    // Exactly one case survives, carrying both devices' reports.
    assert!(hub.record(case_a_id).is_some());
    assert!(hub.record(case_b_id).is_none());
    assert_eq!(hub.resolve_case(case_b_id), Some(case_a_id));
    assert_eq!(hub.reports_of(case_a_id).len(), 2);
    assert_eq!(hub.merge_notes().len(), 1);
    assert!(hub.pending_conflicts().is_empty());

    // The device knows which case its record was folded into.
    let entry = device_b.orchestrator.queue_entry(case_b_id).unwrap();
    assert_eq!(entry.surviving_id, Some(case_a_id));
}

#[test]
fn clear_for_next_event_is_explicit_and_total() {
    init_test_logging();
    let fixture = EventFixture::new();
    let hub = Arc::new(HubServer::new(HubConfig::new()));
    fixture.seed(&hub);
    let device_id = DeviceId::new();
    hub.register_device(device_id, "Tower");

    let state_dir = tempfile::TempDir::new().unwrap();
    let config = EngineConfig::new(device_id, "loopback://hub")
        .with_retry(RetrySchedule::immediate());

    {
        let store = DeviceStateStore::open(state_dir.path()).unwrap();
        let orchestrator = SyncOrchestrator::with_store(
            config.clone(),
            LoopbackTransport::new(Arc::clone(&hub)),
            store,
        )
        .unwrap();
        orchestrator
            .download_reference_data(fixture.competition.sync_id)
            .unwrap();
        orchestrator
            .enqueue(
                RecordPayload::Case(fixture.case("L2", 41, T_10_32_10, device_id)),
                1_000,
            )
            .unwrap();
        orchestrator.drain(2_000).unwrap();

        // Syncing does not clear anything by itself.
        assert_eq!(orchestrator.reference_count(), 11);
        assert_eq!(orchestrator.queue_stats().synced, 1);

        orchestrator.clear_for_next_event().unwrap();
        assert_eq!(orchestrator.reference_count(), 0);
        assert_eq!(orchestrator.queue_stats().synced, 0);
    }

    // The cleared state survives the restart too.
    let store = DeviceStateStore::open(state_dir.path()).unwrap();
    let orchestrator = SyncOrchestrator::with_store(
        config,
        LoopbackTransport::new(Arc::clone(&hub)),
        store,
    )
    .unwrap();
    assert_eq!(orchestrator.reference_count(), 0);
    assert_eq!(orchestrator.queue_stats().pending, 0);
}
