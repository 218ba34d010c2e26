//! A transport wired to an in-process hub.

use parking_lot::Mutex;
use regatta_sync_engine::{EngineError, EngineResult, SyncTransport};
use regatta_sync_protocol::{DownloadRequest, DownloadResponse, UploadRequest, UploadResponse};
use regatta_sync_server::{HubError, HubServer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Connects a device engine directly to a [`HubServer`].
///
/// Supports the outage scenarios the engine has to survive:
/// reachability can be toggled, and uploads can be made to fail after a
/// set number of successes to simulate a crash or network drop
/// mid-drain.
pub struct LoopbackTransport {
    hub: Arc<HubServer>,
    reachable: AtomicBool,
    uploads_served: AtomicU64,
    fail_after: Mutex<Option<u64>>,
}

impl LoopbackTransport {
    /// Creates a transport to the given hub.
    #[must_use]
    pub fn new(hub: Arc<HubServer>) -> Self {
        Self {
            hub,
            reachable: AtomicBool::new(true),
            uploads_served: AtomicU64::new(0),
            fail_after: Mutex::new(None),
        }
    }

    /// The hub this transport talks to.
    #[must_use]
    pub fn hub(&self) -> &Arc<HubServer> {
        &self.hub
    }

    /// Toggles reachability.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes every upload past the next `count` successes fail with a
    /// retryable error, as if the connection dropped mid-drain.
    pub fn fail_uploads_after(&self, count: u64) {
        self.uploads_served.store(0, Ordering::SeqCst);
        *self.fail_after.lock() = Some(count);
    }

    /// Clears failure injection.
    pub fn restore(&self) {
        *self.fail_after.lock() = None;
        self.reachable.store(true, Ordering::SeqCst);
    }

    /// Number of uploads served since the last `fail_uploads_after`.
    #[must_use]
    pub fn uploads_served(&self) -> u64 {
        self.uploads_served.load(Ordering::SeqCst)
    }

    fn map_error(error: HubError) -> EngineError {
        if error.is_client_error() {
            EngineError::transport_fatal(error.to_string())
        } else {
            EngineError::transport_retryable(error.to_string())
        }
    }
}

impl SyncTransport for LoopbackTransport {
    fn probe(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn download(&self, request: &DownloadRequest) -> EngineResult<DownloadResponse> {
        if !self.probe() {
            return Err(EngineError::NotConnected);
        }
        self.hub.handle_download(request).map_err(Self::map_error)
    }

    fn upload(&self, request: &UploadRequest) -> EngineResult<UploadResponse> {
        if !self.probe() {
            return Err(EngineError::NotConnected);
        }
        if let Some(limit) = *self.fail_after.lock() {
            if self.uploads_served.load(Ordering::SeqCst) >= limit {
                return Err(EngineError::transport_retryable(
                    "connection dropped mid-drain",
                ));
            }
        }
        let response = self.hub.handle_upload(request).map_err(Self::map_error)?;
        self.uploads_served.fetch_add(1, Ordering::SeqCst);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventFixture;
    use regatta_sync_server::HubConfig;
    use regatta_types::{DeviceId, EntityKind, RecordPayload};

    #[test]
    fn failure_injection_kicks_in_after_limit() {
        let fixture = EventFixture::new();
        let hub = Arc::new(HubServer::new(HubConfig::new()));
        fixture.seed(&hub);
        let device = DeviceId::new();
        hub.register_device(device, "Tower");

        let transport = LoopbackTransport::new(hub);
        transport.fail_uploads_after(1);

        let request = UploadRequest::new(
            device,
            Vec::new(),
            EntityKind::Case,
            vec![RecordPayload::Case(fixture.case("L1", 42, 38_330_000, device))],
        );
        assert!(transport.upload(&request).is_ok());
        let err = transport.upload(&request).unwrap_err();
        assert!(err.is_retryable());

        transport.restore();
        assert!(transport.upload(&request).is_ok());
    }

    #[test]
    fn unreachable_transport_reports_not_connected() {
        let hub = Arc::new(HubServer::new(HubConfig::new()));
        let transport = LoopbackTransport::new(hub);
        transport.set_reachable(false);
        assert!(!transport.probe());

        let request = DownloadRequest {
            device: DeviceId::new(),
            token: Vec::new(),
            competition: regatta_types::SyncId::new(),
        };
        assert!(matches!(
            transport.download(&request),
            Err(EngineError::NotConnected)
        ));
    }
}
