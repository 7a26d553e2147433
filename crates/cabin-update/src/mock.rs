//! Mock download subsystem and installer for testing

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::download::{
    DownloadId, DownloadProgress, DownloadRequest, DownloadStatus, DownloadSubsystem,
};
use crate::error::UpdateError;
use crate::installer::Installer;

/// What the mock saw when a request was enqueued
#[derive(Debug, Clone)]
pub struct EnqueueRecord {
    pub id: DownloadId,
    pub url: String,
    pub destination: PathBuf,
    /// Whether a file already existed at the destination at enqueue time
    pub destination_existed: bool,
}

/// Download subsystem driven by the test
///
/// Nothing moves on its own: the test sets progress with
/// [`set_progress`](Self::set_progress) and fires completion
/// notifications with [`notify_complete`](Self::notify_complete).
pub struct MockDownloadSubsystem {
    available: AtomicBool,
    next_id: AtomicU64,
    jobs: Mutex<HashMap<DownloadId, (DownloadProgress, PathBuf)>>,
    enqueued: Mutex<Vec<EnqueueRecord>>,
    cancelled: Mutex<Vec<DownloadId>>,
    queries: AtomicUsize,
    completions: broadcast::Sender<DownloadId>,
}

impl Default for MockDownloadSubsystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDownloadSubsystem {
    pub fn new() -> Self {
        let (completions, _) = broadcast::channel(16);
        Self {
            available: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
            enqueued: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
            completions,
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_progress(
        &self,
        id: DownloadId,
        downloaded: u64,
        total: Option<u64>,
        status: DownloadStatus,
    ) {
        if let Some((progress, _)) = self.jobs.lock().get_mut(&id) {
            *progress = DownloadProgress {
                downloaded,
                total,
                status,
            };
        }
    }

    /// Mark the download finished, write the artifact when it succeeded
    /// and push the completion notification
    pub fn finish(&self, id: DownloadId, status: DownloadStatus, contents: &[u8]) {
        let destination = {
            let mut jobs = self.jobs.lock();
            let Some((progress, destination)) = jobs.get_mut(&id) else {
                return;
            };
            progress.status = status;
            destination.clone()
        };
        if status == DownloadStatus::Succeeded {
            let _ = std::fs::write(&destination, contents);
        }
        self.notify_complete(id);
    }

    pub fn notify_complete(&self, id: DownloadId) {
        let _ = self.completions.send(id);
    }

    /// Drop the job as if the user cancelled it elsewhere
    pub fn forget(&self, id: DownloadId) {
        self.jobs.lock().remove(&id);
    }

    pub fn enqueued(&self) -> Vec<EnqueueRecord> {
        self.enqueued.lock().clone()
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Ids passed to [`cancel`](DownloadSubsystem::cancel), in order
    pub fn cancelled(&self) -> Vec<DownloadId> {
        self.cancelled.lock().clone()
    }
}

impl DownloadSubsystem for MockDownloadSubsystem {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId, UpdateError> {
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.enqueued.lock().push(EnqueueRecord {
            id,
            url: request.url.to_string(),
            destination: request.destination.clone(),
            destination_existed: request.destination.exists(),
        });
        self.jobs.lock().insert(
            id,
            (
                DownloadProgress {
                    downloaded: 0,
                    total: None,
                    status: DownloadStatus::Pending,
                },
                request.destination,
            ),
        );
        Ok(id)
    }

    fn query(&self, id: DownloadId) -> Result<DownloadProgress, UpdateError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.jobs
            .lock()
            .get(&id)
            .map(|(progress, _)| *progress)
            .ok_or(UpdateError::UnknownDownload(id))
    }

    fn completions(&self) -> broadcast::Receiver<DownloadId> {
        self.completions.subscribe()
    }

    fn artifact_location(&self, id: DownloadId) -> Option<PathBuf> {
        self.jobs.lock().get(&id).map(|(_, path)| path.clone())
    }

    /// Records the id; the job stays so a test can still drive it
    fn cancel(&self, id: DownloadId) {
        self.cancelled.lock().push(id);
    }
}

/// Installer that records install calls
pub struct RecordingInstaller {
    permitted: AtomicBool,
    permission_requests: AtomicUsize,
    installs: Mutex<Vec<PathBuf>>,
}

impl Default for RecordingInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingInstaller {
    pub fn new() -> Self {
        Self {
            permitted: AtomicBool::new(true),
            permission_requests: AtomicUsize::new(0),
            installs: Mutex::new(Vec::new()),
        }
    }

    pub fn set_permitted(&self, permitted: bool) {
        self.permitted.store(permitted, Ordering::SeqCst);
    }

    pub fn installs(&self) -> Vec<PathBuf> {
        self.installs.lock().clone()
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }
}

impl Installer for RecordingInstaller {
    fn can_install(&self) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }

    fn request_permission(&self) {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn install(&self, artifact: &Path) -> Result<(), UpdateError> {
        self.installs.lock().push(artifact.to_path_buf());
        Ok(())
    }
}
