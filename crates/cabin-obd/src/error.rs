//! OBD errors

use cabin_core::BridgeError;
use thiserror::Error;

use crate::transport::TransportError;

/// OBD-specific errors
#[derive(Debug, Error)]
pub enum ObdError {
    /// No paired adapter matched and no device path was readable
    #[error("No OBD transport found")]
    NotFound,

    /// Connecting to a matched adapter failed
    #[error("Connect to {target} failed: {reason}")]
    ConnectFailed { target: String, reason: String },

    /// Missing runtime grant for the wireless adapter
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A stream is already active
    #[error("OBD stream already {0}")]
    Busy(&'static str),

    /// `stop` was called while the transport was being opened
    #[error("Start cancelled by stop")]
    Cancelled,

    /// A line exceeded the configured maximum
    #[error("Line exceeds {max} bytes ({len} buffered)")]
    FrameTooLong { len: usize, max: usize },

    /// Transport error after the stream was opened
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Worker could not be started or joined
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<ObdError> for BridgeError {
    fn from(err: ObdError) -> Self {
        match err {
            ObdError::NotFound => BridgeError::DiscoveryFailure("no OBD transport".to_string()),
            ObdError::ConnectFailed { .. } | ObdError::Cancelled => {
                BridgeError::DiscoveryFailure(err.to_string())
            }
            ObdError::PermissionDenied(msg) => BridgeError::PermissionDenied(msg),
            ObdError::Busy(_) => BridgeError::ResourceBusy(err.to_string()),
            ObdError::FrameTooLong { .. } => BridgeError::Io(err.to_string()),
            ObdError::Transport(TransportError::PermissionDenied(msg)) => {
                BridgeError::PermissionDenied(msg)
            }
            ObdError::Transport(e) => BridgeError::Io(e.to_string()),
            ObdError::Worker(msg) => BridgeError::Internal(msg),
        }
    }
}
