//! Error types for the hub.

use regatta_sync_protocol::ProtocolError;
use regatta_types::{DeviceId, SyncId};
use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors that can occur on the hub side of sync.
#[derive(Error, Debug)]
pub enum HubError {
    /// Invalid request format or size.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request was not attributable to an authorized device.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The submitting device is not registered.
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// The requested competition does not exist on the hub.
    #[error("unknown competition: {0}")]
    UnknownCompetition(SyncId),

    /// No conflict record with this identifier exists.
    #[error("unknown conflict: {0}")]
    UnknownConflict(u64),

    /// The conflict was already resolved; resolutions are terminal.
    #[error("conflict {0} is already resolved")]
    ConflictAlreadyResolved(u64),

    /// Protocol encode/decode error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Internal hub error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HubError::InvalidRequest(_)
                | HubError::NotAuthorized(_)
                | HubError::UnknownDevice(_)
                | HubError::UnknownCompetition(_)
                | HubError::UnknownConflict(_)
                | HubError::ConflictAlreadyResolved(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            HubError::Internal(_) | HubError::Io(_) | HubError::Protocol(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(HubError::InvalidRequest("bad".into()).is_client_error());
        assert!(HubError::UnknownDevice(DeviceId::from_bytes([0u8; 16])).is_client_error());
        assert!(HubError::Internal("oops".into()).is_server_error());
        assert!(!HubError::InvalidRequest("bad".into()).is_server_error());
    }

    #[test]
    fn error_display() {
        let err = HubError::ConflictAlreadyResolved(12);
        assert!(err.to_string().contains("12"));
    }
}
