//! Common error taxonomy for bridge components

use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur inside bridge components
///
/// None of these ever reach the UI surface as a fault. The bridge facade
/// logs them and answers with a sentinel (`false`, `""` or `"{}"`).
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No transport (or other resource) could be found or opened
    #[error("Discovery failed: {0}")]
    DiscoveryFailure(String),

    /// A runtime grant is missing
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Read, write or connect error after the resource was opened
    #[error("I/O failure: {0}")]
    Io(String),

    /// Attempted to start something that is already running
    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    /// Cached data is older than the staleness window
    #[error("Cached value expired")]
    StaleCache,

    /// A required OS facility is not present
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Short machine-readable name, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::DiscoveryFailure(_) => "discovery_failure",
            BridgeError::PermissionDenied(_) => "permission_denied",
            BridgeError::Io(_) => "io_failure",
            BridgeError::ResourceBusy(_) => "resource_busy",
            BridgeError::StaleCache => "stale_cache",
            BridgeError::Unavailable(_) => "unavailable",
            BridgeError::Internal(_) => "internal",
        }
    }

    /// Whether the error is an expected "nothing to report" outcome rather
    /// than a failure worth a warning
    pub fn is_benign(&self) -> bool {
        matches!(self, BridgeError::StaleCache)
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => BridgeError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => BridgeError::DiscoveryFailure(err.to_string()),
            _ => BridgeError::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no grant");
        assert_eq!(BridgeError::from(denied).kind(), "permission_denied");

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(BridgeError::from(missing).kind(), "discovery_failure");

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(BridgeError::from(reset).kind(), "io_failure");
    }

    #[test]
    fn test_stale_cache_is_benign() {
        assert!(BridgeError::StaleCache.is_benign());
        assert!(!BridgeError::ResourceBusy("obd".into()).is_benign());
    }
}
