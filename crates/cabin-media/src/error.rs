//! Media errors

use cabin_core::BridgeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// The session registry could not be queried
    #[error("Session registry unavailable: {0}")]
    Unavailable(String),

    /// Session access has not been granted to the bridge
    #[error("Media session access not granted")]
    AccessDenied,

    #[error("No active media sessions")]
    NoSessions,

    /// The selected session has nothing to show
    #[error("Selected session {package} has no metadata")]
    NoMetadata { package: String },

    /// Cached snapshot is older than the staleness window
    #[error("Cached media is stale")]
    Stale,
}

impl From<MediaError> for BridgeError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::AccessDenied => BridgeError::PermissionDenied(err.to_string()),
            MediaError::Stale => BridgeError::StaleCache,
            MediaError::Unavailable(msg) => BridgeError::Unavailable(msg),
            MediaError::NoSessions | MediaError::NoMetadata { .. } => {
                BridgeError::Unavailable(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_is_benign() {
        let err = BridgeError::from(MediaError::Stale);
        assert!(err.is_benign());
        assert_eq!(
            BridgeError::from(MediaError::AccessDenied).kind(),
            "permission_denied"
        );
    }
}
