//! Error types for the sync engine.

use regatta_sync_protocol::ProtocolError;
use regatta_types::SyncId;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur on the device side of sync.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The call exceeded its bounded timeout. The hub may have
    /// committed before the response was lost, so this is transient.
    #[error("operation timed out")]
    Timeout,

    /// The hub is not reachable.
    #[error("not connected to hub")]
    NotConnected,

    /// Protocol encode/decode error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A queue operation named an identifier the queue does not hold.
    /// This is a programming error, never a silent no-op.
    #[error("unknown queue entry {0}")]
    UnknownEntry(SyncId),

    /// A queue entry was not in the state the operation requires.
    #[error("queue entry {id} is not in {expected} state")]
    WrongState {
        /// The entry.
        id: SyncId,
        /// The state the operation requires.
        expected: &'static str,
    },

    /// The hub answered with a different number of outcomes than
    /// records submitted.
    #[error("upload response carried {got} outcomes for {sent} records")]
    OutcomeMismatch {
        /// Records submitted.
        sent: usize,
        /// Outcomes received.
        got: usize,
    },

    /// Device-local state could not be loaded or saved.
    #[error("state store error: {0}")]
    State(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport { retryable, .. } => *retryable,
            EngineError::Timeout | EngineError::NotConnected => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(EngineError::transport_retryable("connection lost").is_retryable());
        assert!(!EngineError::transport_fatal("bad certificate").is_retryable());
        assert!(EngineError::Timeout.is_retryable());
        assert!(EngineError::NotConnected.is_retryable());
        assert!(!EngineError::UnknownEntry(SyncId::from_bytes([0u8; 16])).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = EngineError::OutcomeMismatch { sent: 3, got: 2 };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));
    }
}
