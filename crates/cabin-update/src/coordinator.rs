//! Update download coordinator
//!
//! One tracked job at a time. Each job has a single authoritative state,
//! `Enqueued → Running → {Succeeded, Failed}`, held in a `watch` channel.
//! Two observers feed the terminal transition:
//!
//! - the poll loop, which queries byte progress every poll interval and
//!   posts `onDownloadProgress`
//! - the completion listener, which reacts to the subsystem's push
//!   notification
//!
//! Whichever sees the terminal status first performs the transition; the
//! transition to `Succeeded` triggers installation, so install happens
//! exactly once per job regardless of which observer wins. A superseded
//! job is cancelled in the subsystem, never reaches a terminal state and
//! never installs. A job that reached a terminal state is no longer
//! tracked.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cabin_core::{BridgeEvent, EventSink};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::UpdateConfig;
use crate::download::{DownloadId, DownloadRequest, DownloadStatus, DownloadSubsystem};
use crate::error::UpdateError;
use crate::installer::Installer;

/// Lifecycle of one download job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Enqueued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Observer handle for a started job
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: DownloadId,
    pub enqueued_at: DateTime<Utc>,
    state: watch::Receiver<JobState>,
}

impl JobHandle {
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Wait for the job to succeed or fail
    ///
    /// Returns the last known state if the job was dropped before that.
    pub async fn wait_terminal(&mut self) -> JobState {
        let result = self.state.wait_for(|s| s.is_terminal()).await.map(|s| *s);
        match result {
            Ok(state) => state,
            Err(_) => *self.state.borrow(),
        }
    }
}

/// Result of [`UpdateCoordinator::start`]
#[derive(Debug)]
pub enum StartOutcome {
    Enqueued(JobHandle),
    /// Install permission is missing; the user was sent to grant it and
    /// nothing was enqueued
    PermissionRequested,
}

/// Id and state of the tracked job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub id: DownloadId,
    pub state: JobState,
}

/// State shared by the coordinator and both observers of one job
struct JobShared {
    id: DownloadId,
    state: watch::Sender<JobState>,
    /// Claimed by the first observer to see a terminal status
    settled: AtomicBool,
    subsystem: Arc<dyn DownloadSubsystem>,
    installer: Arc<dyn Installer>,
    fallback_artifact: PathBuf,
}

impl JobShared {
    fn current(&self) -> JobState {
        *self.state.borrow()
    }

    fn mark_running(&self) {
        self.state.send_if_modified(|s| {
            if *s == JobState::Enqueued {
                *s = JobState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Apply a terminal status. Only the first call per job has an effect.
    ///
    /// The install handoff happens before the terminal state is published,
    /// so anyone woken by the state change can already see it.
    fn record_terminal(&self, status: DownloadStatus, observer: &'static str) {
        let next = match status {
            DownloadStatus::Succeeded => JobState::Succeeded,
            DownloadStatus::Failed => JobState::Failed,
            DownloadStatus::Pending | DownloadStatus::Running => return,
        };

        if self
            .settled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(id = %self.id, observer, "Terminal state already recorded");
            return;
        }

        info!(id = %self.id, state = ?next, observer, "Update download finished");
        if next == JobState::Succeeded {
            self.install();
        }
        self.state.send_replace(next);
    }

    fn install(&self) {
        let artifact = self
            .subsystem
            .artifact_location(self.id)
            .unwrap_or_else(|| self.fallback_artifact.clone());

        if !artifact.exists() {
            warn!(id = %self.id, artifact = %artifact.display(), "Downloaded artifact missing, not installing");
            return;
        }
        if let Err(e) = self.installer.install(&artifact) {
            warn!(id = %self.id, error = %e, "Install handoff failed");
        }
    }
}

struct ActiveJob {
    shared: Arc<JobShared>,
    poller: JoinHandle<()>,
    listener: JoinHandle<()>,
}

impl ActiveJob {
    fn abort(&self) {
        self.poller.abort();
        self.listener.abort();
    }
}

/// Coordinates update downloads
pub struct UpdateCoordinator {
    subsystem: Arc<dyn DownloadSubsystem>,
    installer: Arc<dyn Installer>,
    sink: Arc<dyn EventSink>,
    artifact_path: PathBuf,
    poll_interval: Duration,
    require_install_permission: bool,
    current: Mutex<Option<ActiveJob>>,
}

impl UpdateCoordinator {
    pub fn new(
        subsystem: Arc<dyn DownloadSubsystem>,
        installer: Arc<dyn Installer>,
        sink: Arc<dyn EventSink>,
        config: &UpdateConfig,
    ) -> Self {
        Self {
            subsystem,
            installer,
            sink,
            artifact_path: config.artifact_path(),
            poll_interval: config.poll_interval(),
            require_install_permission: config.require_install_permission,
            current: Mutex::new(None),
        }
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Whether a downloaded artifact is waiting at the fixed location
    pub fn artifact_present(&self) -> bool {
        self.artifact_path.exists()
    }

    /// Start downloading `url` to the fixed artifact location
    ///
    /// Supersedes any previous job: its poll loop and completion listener
    /// are stopped, the subsystem cancels its transfer and it will never
    /// install. Must be called within a tokio runtime.
    pub async fn start(&self, url: &str) -> Result<StartOutcome, UpdateError> {
        if !self.subsystem.is_available() {
            return Err(UpdateError::Unavailable("no download subsystem".into()));
        }
        if self.require_install_permission && !self.installer.can_install() {
            info!("Install permission missing, requesting it instead of downloading");
            self.installer.request_permission();
            return Ok(StartOutcome::PermissionRequested);
        }

        let url = Url::parse(url)?;

        let previous = self.current.lock().take();
        if let Some(previous) = previous {
            self.supersede(previous);
        }

        remove_stale_artifact(&self.artifact_path).await?;

        // Subscribe before enqueueing so a fast completion is not missed
        let completions = self.subsystem.completions();
        let id = self.subsystem.enqueue(DownloadRequest {
            url: url.clone(),
            destination: self.artifact_path.clone(),
            title: "Cabin update".to_string(),
        })?;

        let (state_tx, state_rx) = watch::channel(JobState::Enqueued);
        let shared = Arc::new(JobShared {
            id,
            state: state_tx,
            settled: AtomicBool::new(false),
            subsystem: self.subsystem.clone(),
            installer: self.installer.clone(),
            fallback_artifact: self.artifact_path.clone(),
        });

        let poller = tokio::spawn(poll_progress(
            shared.clone(),
            self.sink.clone(),
            self.poll_interval,
        ));
        let listener = tokio::spawn(listen_for_completion(shared.clone(), completions));

        info!(%id, %url, artifact = %self.artifact_path.display(), "Update download enqueued");

        let raced = self.current.lock().replace(ActiveJob {
            shared,
            poller,
            listener,
        });
        if let Some(raced) = raced {
            self.supersede(raced);
        }

        Ok(StartOutcome::Enqueued(JobHandle {
            id,
            enqueued_at: Utc::now(),
            state: state_rx,
        }))
    }

    fn supersede(&self, previous: ActiveJob) {
        previous.abort();
        if previous.shared.current().is_terminal() {
            return;
        }
        self.subsystem.cancel(previous.shared.id);
        debug!(id = %previous.shared.id, "Superseded previous update download");
    }

    /// The tracked job, if any
    ///
    /// `None` once the job succeeded or failed: a finished job stops being
    /// tracked.
    pub fn current_job(&self) -> Option<JobSnapshot> {
        let mut current = self.current.lock();
        if current
            .as_ref()
            .is_some_and(|job| job.shared.current().is_terminal())
        {
            if let Some(finished) = current.take() {
                finished.abort();
                debug!(id = %finished.shared.id, "Finished update download no longer tracked");
            }
        }
        current.as_ref().map(|job| JobSnapshot {
            id: job.shared.id,
            state: job.shared.current(),
        })
    }

    /// Stop observing the tracked job. The download itself is left to the
    /// subsystem.
    pub fn shutdown(&self) {
        if let Some(job) = self.current.lock().take() {
            job.abort();
            debug!(id = %job.shared.id, "Update coordinator shut down");
        }
    }
}

impl Drop for UpdateCoordinator {
    fn drop(&mut self) {
        if let Some(job) = self.current.get_mut().take() {
            job.abort();
        }
    }
}

/// Remove a leftover artifact so the subsystem never appends to or renames
/// around an old file
async fn remove_stale_artifact(path: &Path) -> Result<(), UpdateError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale update artifact");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn poll_progress(shared: Arc<JobShared>, sink: Arc<dyn EventSink>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if shared.current().is_terminal() {
            break;
        }

        let progress = match shared.subsystem.query(shared.id) {
            Ok(progress) => progress,
            Err(e) => {
                // Leave the outcome to the completion listener
                warn!(id = %shared.id, error = %e, "Progress query failed, polling stopped");
                break;
            }
        };

        if progress.status == DownloadStatus::Running {
            shared.mark_running();
        }
        if let Some(percent) = progress.percent() {
            sink.post(BridgeEvent::DownloadProgress(percent));
        }
        if progress.status.is_terminal() {
            shared.record_terminal(progress.status, "poll");
            break;
        }
    }
    debug!(id = %shared.id, "Progress polling stopped");
}

async fn listen_for_completion(
    shared: Arc<JobShared>,
    mut completions: broadcast::Receiver<DownloadId>,
) {
    let mut state = shared.state.subscribe();

    loop {
        let finished = tokio::select! {
            _ = state.wait_for(|s| s.is_terminal()) => break,
            msg = completions.recv() => match msg {
                Ok(id) => id == shared.id,
                // Missed notifications; ask directly
                Err(broadcast::error::RecvError::Lagged(_)) => true,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };
        if !finished {
            continue;
        }

        match shared.subsystem.query(shared.id) {
            Ok(progress) if progress.status.is_terminal() => {
                shared.record_terminal(progress.status, "completion");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(id = %shared.id, error = %e, "Completion status query failed");
                break;
            }
        }
    }
    debug!(id = %shared.id, "Completion listener deregistered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDownloadSubsystem, RecordingInstaller};
    use cabin_core::testing::RecordingSink;

    struct Fixture {
        _dir: tempfile::TempDir,
        subsystem: Arc<MockDownloadSubsystem>,
        installer: Arc<RecordingInstaller>,
        sink: Arc<RecordingSink>,
        coordinator: UpdateCoordinator,
    }

    fn fixture(require_permission: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = UpdateConfig {
            download_dir: dir.path().to_path_buf(),
            require_install_permission: require_permission,
            ..UpdateConfig::default()
        };
        let subsystem = Arc::new(MockDownloadSubsystem::new());
        let installer = Arc::new(RecordingInstaller::new());
        let sink = Arc::new(RecordingSink::new());
        let coordinator =
            UpdateCoordinator::new(subsystem.clone(), installer.clone(), sink.clone(), &config);
        Fixture {
            _dir: dir,
            subsystem,
            installer,
            sink,
            coordinator,
        }
    }

    fn enqueued(outcome: StartOutcome) -> JobHandle {
        match outcome {
            StartOutcome::Enqueued(handle) => handle,
            StartOutcome::PermissionRequested => panic!("expected enqueue"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_posted_each_poll() {
        let f = fixture(false);
        let mut job = enqueued(f.coordinator.start("https://example.com/u.pkg").await.unwrap());

        f.subsystem
            .set_progress(job.id, 2_500_000, Some(10_000_000), DownloadStatus::Running);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(job.state(), JobState::Running);

        f.subsystem
            .set_progress(job.id, 10_000_000, Some(10_000_000), DownloadStatus::Succeeded);
        std::fs::write(f.coordinator.artifact_path(), b"pkg").unwrap();
        assert_eq!(job.wait_terminal().await, JobState::Succeeded);

        assert_eq!(f.sink.progress(), vec![25, 100]);
        assert_eq!(f.installer.installs().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_job_is_no_longer_tracked() {
        let f = fixture(false);
        let mut job = enqueued(f.coordinator.start("https://example.com/u.pkg").await.unwrap());
        assert_eq!(
            f.coordinator.current_job(),
            Some(JobSnapshot {
                id: job.id,
                state: JobState::Enqueued,
            })
        );

        f.subsystem.finish(job.id, DownloadStatus::Failed, b"");
        assert_eq!(job.wait_terminal().await, JobState::Failed);
        assert!(f.coordinator.current_job().is_none());

        // Starting again does not cancel the finished job
        f.coordinator.start("https://example.com/u.pkg").await.unwrap();
        assert!(f.subsystem.cancelled().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersede_cancels_previous_transfer() {
        let f = fixture(false);
        let first = enqueued(f.coordinator.start("https://example.com/a.pkg").await.unwrap());
        let second = enqueued(f.coordinator.start("https://example.com/b.pkg").await.unwrap());

        assert_eq!(f.subsystem.cancelled(), vec![first.id]);
        assert_eq!(f.coordinator.current_job().map(|j| j.id), Some(second.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_total_posts_nothing() {
        let f = fixture(false);
        let job = enqueued(f.coordinator.start("https://example.com/u.pkg").await.unwrap());

        f.subsystem.set_progress(job.id, 4096, Some(0), DownloadStatus::Running);
        tokio::time::sleep(Duration::from_millis(1600)).await;

        assert!(f.subsystem.queries() >= 3);
        assert!(f.sink.progress().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_download_does_not_install() {
        let f = fixture(false);
        let mut job = enqueued(f.coordinator.start("https://example.com/u.pkg").await.unwrap());

        f.subsystem.finish(job.id, DownloadStatus::Failed, b"");
        assert_eq!(job.wait_terminal().await, JobState::Failed);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(f.installer.installs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_missing_redirects() {
        let f = fixture(true);
        f.installer.set_permitted(false);

        let outcome = f.coordinator.start("https://example.com/u.pkg").await.unwrap();
        assert!(matches!(outcome, StartOutcome::PermissionRequested));
        assert_eq!(f.installer.permission_requests(), 1);
        assert!(f.subsystem.enqueued().is_empty());
        assert!(f.coordinator.current_job().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_and_bad_url() {
        let f = fixture(false);
        assert!(matches!(
            f.coordinator.start("not a url").await,
            Err(UpdateError::InvalidUrl(_))
        ));

        f.subsystem.set_available(false);
        assert!(matches!(
            f.coordinator.start("https://example.com/u.pkg").await,
            Err(UpdateError::Unavailable(_))
        ));
        assert!(f.subsystem.enqueued().is_empty());
    }
}
