use std::time::Duration;

use kiln_protocol::ProtocolError;
use kiln_types::BitId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote error: code={code}, message={message}")]
    Remote { code: u32, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },

    #[error("protocol version mismatch: local {local}, remote {remote}")]
    VersionMismatch { local: u32, remote: u32 },

    #[error("verification of {id} failed: {reason}")]
    Verification { id: BitId, reason: String },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SyncError {
    /// Failures worth retrying: the request may succeed on another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Protocol(ProtocolError::Io(_)) => true,
            _ => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
