//! Transport layer abstraction for sync operations.

use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use regatta_sync_protocol::{DownloadRequest, DownloadResponse, UploadRequest, UploadResponse};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// A sync transport handles network communication with the hub.
///
/// This trait abstracts the network layer, allowing different
/// implementations (HTTP, loopback for tests, mock). Every call has a
/// bounded timeout; implementations report a timed-out call as a
/// retryable error, never as a definitive negative outcome — the hub
/// may have committed before the response was lost, and the hub's
/// identity layer makes the retry safe.
pub trait SyncTransport: Send + Sync {
    /// Cheaply checks whether the hub is currently reachable.
    fn probe(&self) -> bool;

    /// Downloads the reference graph for one competition.
    fn download(&self, request: &DownloadRequest) -> EngineResult<DownloadResponse>;

    /// Uploads one batch of records of a single kind.
    fn upload(&self, request: &UploadRequest) -> EngineResult<UploadResponse>;
}

/// A scripted transport for unit tests.
#[derive(Default)]
pub struct MockTransport {
    reachable: AtomicBool,
    fail_uploads: AtomicU32,
    download_response: Mutex<Option<DownloadResponse>>,
    upload_responses: Mutex<VecDeque<UploadResponse>>,
    seen_uploads: Mutex<Vec<UploadRequest>>,
}

impl MockTransport {
    /// Creates a reachable mock with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Sets reachability for `probe()` and all calls.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes the next `count` uploads fail with a retryable error.
    pub fn fail_next_uploads(&self, count: u32) {
        self.fail_uploads.store(count, Ordering::SeqCst);
    }

    /// Sets the download response.
    pub fn set_download_response(&self, response: DownloadResponse) {
        *self.download_response.lock() = Some(response);
    }

    /// Queues an upload response; responses are consumed in order.
    pub fn push_upload_response(&self, response: UploadResponse) {
        self.upload_responses.lock().push_back(response);
    }

    /// Returns every upload request seen so far.
    #[must_use]
    pub fn seen_uploads(&self) -> Vec<UploadRequest> {
        self.seen_uploads.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn probe(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn download(&self, _request: &DownloadRequest) -> EngineResult<DownloadResponse> {
        if !self.probe() {
            return Err(EngineError::NotConnected);
        }
        self.download_response
            .lock()
            .clone()
            .ok_or_else(|| EngineError::transport_fatal("no mock download response set"))
    }

    fn upload(&self, request: &UploadRequest) -> EngineResult<UploadResponse> {
        if !self.probe() {
            return Err(EngineError::NotConnected);
        }
        if self
            .fail_uploads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(EngineError::transport_retryable("injected upload failure"));
        }
        self.seen_uploads.lock().push(request.clone());
        self.upload_responses
            .lock()
            .pop_front()
            .ok_or_else(|| EngineError::transport_fatal("no mock upload response queued"))
    }
}
