//! The hub server facade.

use crate::auth::DeviceRegistry;
use crate::config::HubConfig;
use crate::conflicts::{ConflictRecord, ConflictStore, ResolutionAction};
use crate::error::HubResult;
use crate::handler::RequestHandler;
use crate::store::{HubStore, MergeNote};
use regatta_sync_protocol::{
    DownloadRequest, DownloadResponse, RecordOutcome, UploadRequest, UploadResponse,
};
use regatta_types::{DeviceId, IncidentReport, RecordPayload, SyncId};
use std::sync::Arc;

/// The hub, wired together for embedding.
///
/// This facade owns the store, the conflict store, the device registry
/// and the request handler. A real deployment exposes HTTP endpoints
/// that call [`HubServer::handle_download`] and
/// [`HubServer::handle_upload`]; tests drive it in-process through a
/// loopback transport.
pub struct HubServer {
    handler: RequestHandler,
    store: Arc<HubStore>,
    conflicts: Arc<ConflictStore>,
    registry: Arc<DeviceRegistry>,
}

impl HubServer {
    /// Creates a hub from configuration.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        let store = Arc::new(HubStore::new());
        let conflicts = Arc::new(ConflictStore::new(
            Arc::clone(&store),
            config.fingerprint_bucket,
        ));
        let registry = Arc::new(DeviceRegistry::new());
        let handler = RequestHandler::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&conflicts),
        );
        Self {
            handler,
            store,
            conflicts,
            registry,
        }
    }

    /// Registers a field device.
    pub fn register_device(&self, device: DeviceId, name: impl Into<String>) {
        self.registry.register(device, name, unix_now_ms());
    }

    /// Issues an auth token for a registered device (empty when the hub
    /// runs without authentication).
    pub fn issue_token(&self, device: DeviceId) -> HubResult<Vec<u8>> {
        self.handler.issue_token(device, unix_now_ms())
    }

    /// Handles a reference download.
    pub fn handle_download(&self, request: &DownloadRequest) -> HubResult<DownloadResponse> {
        self.handler.handle_download(request, unix_now_ms())
    }

    /// Handles an upload batch with the system clock.
    pub fn handle_upload(&self, request: &UploadRequest) -> HubResult<UploadResponse> {
        self.handler.handle_upload(request, unix_now_ms())
    }

    /// Handles an upload batch at an explicit time (tests).
    pub fn handle_upload_at(
        &self,
        request: &UploadRequest,
        now_ms: u64,
    ) -> HubResult<UploadResponse> {
        self.handler.handle_upload(request, now_ms)
    }

    /// Commits a record created on the hub itself (reference CRUD
    /// workflows feed the store through this).
    pub fn commit_local(&self, record: &RecordPayload) -> RecordOutcome {
        self.handler.commit_local(record, unix_now_ms())
    }

    /// Conflicts awaiting operator adjudication.
    #[must_use]
    pub fn pending_conflicts(&self) -> Vec<ConflictRecord> {
        self.conflicts.pending()
    }

    /// Looks up one conflict.
    #[must_use]
    pub fn conflict(&self, id: u64) -> Option<ConflictRecord> {
        self.conflicts.get(id)
    }

    /// Applies an operator's resolution to a conflict.
    pub fn resolve_conflict(
        &self,
        id: u64,
        action: ResolutionAction,
        operator: &str,
    ) -> HubResult<()> {
        self.conflicts.resolve(id, action, operator, unix_now_ms())
    }

    /// The auto-merge audit log.
    #[must_use]
    pub fn merge_notes(&self) -> Vec<MergeNote> {
        self.store.read().merge_notes().to_vec()
    }

    /// Reports attached to a case (merge aliases resolved).
    #[must_use]
    pub fn reports_of(&self, case: SyncId) -> Vec<IncidentReport> {
        self.store.read().reports_of(case)
    }

    /// Looks up a committed record.
    #[must_use]
    pub fn record(&self, id: SyncId) -> Option<RecordPayload> {
        self.store.read().get(id).cloned()
    }

    /// Resolves a case identifier through the merge alias map.
    #[must_use]
    pub fn resolve_case(&self, id: SyncId) -> Option<SyncId> {
        self.store.read().resolve_case(id)
    }

    /// Number of committed records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.store.read().len()
    }
}

pub(crate) fn unix_now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
