//! Transport layer errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Transport not supported: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => TransportError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => TransportError::NotFound(err.to_string()),
            _ => TransportError::ReceiveFailed(err.to_string()),
        }
    }
}
