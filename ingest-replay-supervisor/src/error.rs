//! Error types for supervisor operations

use std::time::Duration;
use thiserror::Error;

use ingest_replay_core::error::ReplayError;

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Error code reported when a connect attempt times out
pub const CODE_TIMEOUT: i32 = -1;

/// Error code reported when writing without a session
pub const CODE_NOT_CONNECTED: i32 = -2;

/// Error code reported when the OS gave no error number
pub const CODE_UNKNOWN: i32 = -3;

/// Fatal supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("transport event channel closed")]
    ChannelClosed,
}

/// Session-level transport failures.
///
/// None of these are fatal: the supervisor turns them into a backoff and a
/// later reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("not connected")]
    NotConnected,
}

impl TransportError {
    /// Integer code passed along with an error event
    pub fn code(&self) -> i32 {
        match self {
            TransportError::Connect { source, .. } => source.raw_os_error().unwrap_or(CODE_UNKNOWN),
            TransportError::Io(source) => source.raw_os_error().unwrap_or(CODE_UNKNOWN),
            TransportError::Timeout { .. } => CODE_TIMEOUT,
            TransportError::NotConnected => CODE_NOT_CONNECTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let refused = TransportError::Io(std::io::Error::from_raw_os_error(111));
        assert_eq!(refused.code(), 111);

        let synthetic = TransportError::Io(std::io::Error::other("boom"));
        assert_eq!(synthetic.code(), CODE_UNKNOWN);

        let timeout = TransportError::Timeout {
            address: "localhost:8000".into(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(timeout.code(), CODE_TIMEOUT);
        assert_eq!(TransportError::NotConnected.code(), CODE_NOT_CONNECTED);
    }

    #[test]
    fn test_replay_error_converts() {
        let err: SupervisorError = ReplayError::TooFewRecords { found: 1 }.into();
        assert!(matches!(err, SupervisorError::Replay(_)));
        assert!(err.to_string().contains("at least 2"));
    }
}
