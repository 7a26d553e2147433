//! Update errors

use cabin_core::BridgeError;
use thiserror::Error;

use crate::download::DownloadId;

#[derive(Debug, Error)]
pub enum UpdateError {
    /// No download subsystem on this host
    #[error("Download subsystem unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The subsystem does not know the id (removed or never enqueued)
    #[error("Unknown download {0}")]
    UnknownDownload(DownloadId),

    #[error("Install failed: {0}")]
    Install(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<UpdateError> for BridgeError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::Unavailable(msg) => BridgeError::Unavailable(msg),
            UpdateError::Io(e) => BridgeError::from(e),
            UpdateError::Http(_) | UpdateError::Server { .. } => BridgeError::Io(err.to_string()),
            UpdateError::InvalidUrl(_)
            | UpdateError::UnknownDownload(_)
            | UpdateError::Install(_)
            | UpdateError::Parse(_) => BridgeError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_mapping() {
        assert_eq!(
            BridgeError::from(UpdateError::Unavailable("none".into())).kind(),
            "unavailable"
        );
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "ro");
        assert_eq!(
            BridgeError::from(UpdateError::Io(denied)).kind(),
            "permission_denied"
        );
        assert_eq!(
            BridgeError::from(UpdateError::Server {
                status: 404,
                message: "gone".into()
            })
            .kind(),
            "io_failure"
        );
    }
}
