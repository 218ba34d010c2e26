//! Request handlers for the sync endpoints.

use crate::auth::{AuthConfig, DeviceRegistry, TokenValidator};
use crate::config::HubConfig;
use crate::conflicts::ConflictStore;
use crate::dedup::DedupEngine;
use crate::error::{HubError, HubResult};
use crate::store::HubStore;
use regatta_sync_protocol::{
    DownloadRequest, DownloadResponse, RecordOutcome, UploadRequest, UploadResponse,
};
use regatta_types::DeviceId;
use std::sync::Arc;
use tracing::debug;

/// Handles download and upload requests.
///
/// Authentication happens first: a request from an unregistered or
/// badly-signed device never reaches the deduplication engine.
pub struct RequestHandler {
    config: HubConfig,
    registry: Arc<DeviceRegistry>,
    validator: Option<TokenValidator>,
    store: Arc<HubStore>,
    dedup: DedupEngine,
}

impl RequestHandler {
    /// Creates a handler over shared hub components.
    pub fn new(
        config: HubConfig,
        registry: Arc<DeviceRegistry>,
        store: Arc<HubStore>,
        conflicts: Arc<ConflictStore>,
    ) -> Self {
        let validator = config.auth_secret.as_ref().filter(|_| config.require_auth).map(
            |secret| {
                TokenValidator::new(
                    AuthConfig::new(secret.clone()).with_expiry(config.token_expiry),
                )
            },
        );
        let dedup = DedupEngine::new(
            Arc::clone(&store),
            conflicts,
            config.fingerprint_bucket,
        );
        Self {
            config,
            registry,
            validator,
            store,
            dedup,
        }
    }

    /// Handles a pre-event reference download.
    pub fn handle_download(
        &self,
        request: &DownloadRequest,
        now_ms: u64,
    ) -> HubResult<DownloadResponse> {
        self.authorize(request.device, &request.token, now_ms)?;
        let graph = self
            .store
            .read()
            .reference_graph(request.competition)
            .ok_or(HubError::UnknownCompetition(request.competition))?;
        debug!(device = %request.device, records = graph.len(), "reference graph downloaded");
        Ok(DownloadResponse { graph })
    }

    /// Handles one upload batch, producing a parallel outcome array.
    pub fn handle_upload(
        &self,
        request: &UploadRequest,
        now_ms: u64,
    ) -> HubResult<UploadResponse> {
        self.authorize(request.device, &request.token, now_ms)?;

        if request.records.len() > self.config.max_upload_batch {
            return Err(HubError::InvalidRequest(format!(
                "too many records: {} > {}",
                request.records.len(),
                self.config.max_upload_batch
            )));
        }

        let outcomes = request
            .records
            .iter()
            .map(|record| {
                if record.kind() != request.kind {
                    // Malformed: wrong endpoint for this record; never
                    // accepted as-is, so not worth retrying.
                    RecordOutcome::Rejected {
                        reason: format!(
                            "expected a {} record, got {}",
                            request.kind,
                            record.kind()
                        ),
                    }
                } else {
                    self.dedup.process(record, request.device, now_ms)
                }
            })
            .collect();

        Ok(UploadResponse { outcomes })
    }

    /// Commits a record created on the hub itself (reference CRUD
    /// workflows), attributed to the hub's own replica identity.
    pub fn commit_local(&self, record: &regatta_types::RecordPayload, now_ms: u64) -> RecordOutcome {
        self.dedup.process(record, self.config.hub_device, now_ms)
    }

    fn authorize(&self, device: DeviceId, token: &[u8], now_ms: u64) -> HubResult<()> {
        self.registry.require(device)?;
        if let Some(validator) = &self.validator {
            validator.validate_token(token, device, self.config.hub_id, now_ms)?;
        }
        Ok(())
    }

    /// Issues a token for a registered device. Fails when the hub runs
    /// without authentication.
    pub fn issue_token(&self, device: DeviceId, now_ms: u64) -> HubResult<Vec<u8>> {
        self.registry.require(device)?;
        match &self.validator {
            Some(validator) => Ok(validator.create_token(device, self.config.hub_id, now_ms)),
            None => Ok(Vec::new()),
        }
    }
}
