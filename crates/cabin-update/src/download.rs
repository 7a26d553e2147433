//! Download subsystem seam
//!
//! The coordinator never transfers bytes itself. It hands a request to a
//! [`DownloadSubsystem`], polls it for byte progress and listens for its
//! completion notifications.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::broadcast;
use url::Url;

use crate::error::UpdateError;

/// Id assigned by the subsystem on enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DownloadId(pub u64);

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadStatus::Succeeded | DownloadStatus::Failed)
    }
}

/// Byte progress of one download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// `None` until the size is known
    pub total: Option<u64>,
    pub status: DownloadStatus,
}

impl DownloadProgress {
    /// `floor(downloaded * 100 / total)`, capped at 100
    ///
    /// `None` when the total is unknown or zero; no progress is reported
    /// for such a poll.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total.filter(|t| *t > 0)?;
        let percent = (self.downloaded as u128 * 100) / total as u128;
        Some(percent.min(100) as u8)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: Url,
    /// Final location of the artifact
    pub destination: PathBuf,
    /// Human-readable label for the subsystem's own UI/logs
    pub title: String,
}

/// A facility that downloads files in the background
pub trait DownloadSubsystem: Send + Sync {
    fn is_available(&self) -> bool;

    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId, UpdateError>;

    fn query(&self, id: DownloadId) -> Result<DownloadProgress, UpdateError>;

    /// Ids of downloads that reached a terminal status, pushed from the
    /// subsystem's own context
    fn completions(&self) -> broadcast::Receiver<DownloadId>;

    /// Where a finished download was stored
    fn artifact_location(&self, id: DownloadId) -> Option<PathBuf>;

    /// Stop a download and forget it
    ///
    /// An unfinished download stops writing and leaves nothing at its
    /// destination. Unknown ids are ignored.
    fn cancel(&self, id: DownloadId);
}
