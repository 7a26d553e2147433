//! HTTP download subsystem
//!
//! Streams the response body into `<destination>.<id>.part` and renames it
//! into place once complete, so the destination only ever holds a whole
//! file. Each job writes its own partial file; a cancelled job's fetch task
//! is aborted and its partial file removed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::UpdateConfig;
use crate::download::{
    DownloadId, DownloadProgress, DownloadRequest, DownloadStatus, DownloadSubsystem,
};
use crate::error::UpdateError;

#[derive(Debug)]
struct Job {
    progress: DownloadProgress,
    destination: PathBuf,
    task: Option<JoinHandle<()>>,
}

type Jobs = Arc<Mutex<HashMap<DownloadId, Job>>>;

/// [`DownloadSubsystem`] over `reqwest`
pub struct HttpDownloader {
    client: Client,
    runtime: Handle,
    next_id: AtomicU64,
    jobs: Jobs,
    completions: broadcast::Sender<DownloadId>,
}

impl HttpDownloader {
    /// Build the client. Must be called within a tokio runtime; downloads
    /// run on that runtime.
    pub fn new(config: &UpdateConfig) -> Result<Self, UpdateError> {
        let client = Client::builder()
            .user_agent(concat!("cabind/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout())
            .build()?;
        Self::with_client(client)
    }

    pub fn with_client(client: Client) -> Result<Self, UpdateError> {
        let runtime = Handle::try_current()
            .map_err(|e| UpdateError::Unavailable(format!("no async runtime: {}", e)))?;
        let (completions, _) = broadcast::channel(16);
        Ok(Self {
            client,
            runtime,
            next_id: AtomicU64::new(1),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            completions,
        })
    }
}

impl DownloadSubsystem for HttpDownloader {
    fn is_available(&self) -> bool {
        true
    }

    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId, UpdateError> {
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::SeqCst));
        {
            let mut jobs = self.jobs.lock();
            let before = jobs.len();
            jobs.retain(|_, job| !job.progress.status.is_terminal());
            if jobs.len() < before {
                debug!(pruned = before - jobs.len(), "Forgot finished downloads");
            }
            jobs.insert(
                id,
                Job {
                    progress: DownloadProgress {
                        downloaded: 0,
                        total: None,
                        status: DownloadStatus::Pending,
                    },
                    destination: request.destination.clone(),
                    task: None,
                },
            );
        }

        let client = self.client.clone();
        let jobs = self.jobs.clone();
        let completions = self.completions.clone();
        let task = self.runtime.spawn(async move {
            let partial = partial_path(&request.destination, id);
            let result = fetch(&client, &request.url, &partial, &request.destination, id, &jobs).await;
            let status = match result {
                Ok(bytes) => {
                    info!(%id, bytes, path = %request.destination.display(), "Download complete");
                    DownloadStatus::Succeeded
                }
                Err(e) => {
                    warn!(%id, url = %request.url, error = %e, "Download failed");
                    remove_partial(&partial);
                    DownloadStatus::Failed
                }
            };
            if let Some(job) = jobs.lock().get_mut(&id) {
                job.progress.status = status;
            }
            // Nobody listening is fine
            let _ = completions.send(id);
        });

        if let Some(job) = self.jobs.lock().get_mut(&id) {
            job.task = Some(task);
        }

        debug!(%id, "Download enqueued");
        Ok(id)
    }

    fn query(&self, id: DownloadId) -> Result<DownloadProgress, UpdateError> {
        self.jobs
            .lock()
            .get(&id)
            .map(|job| job.progress)
            .ok_or(UpdateError::UnknownDownload(id))
    }

    fn completions(&self) -> broadcast::Receiver<DownloadId> {
        self.completions.subscribe()
    }

    fn artifact_location(&self, id: DownloadId) -> Option<PathBuf> {
        self.jobs.lock().get(&id).map(|job| job.destination.clone())
    }

    fn cancel(&self, id: DownloadId) {
        let Some(job) = self.jobs.lock().remove(&id) else {
            return;
        };
        if let Some(task) = job.task {
            task.abort();
        }
        if !job.progress.status.is_terminal() {
            remove_partial(&partial_path(&job.destination, id));
            info!(%id, "Download cancelled");
        }
    }
}

fn partial_path(destination: &Path, id: DownloadId) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(format!(".{}.part", id));
    PathBuf::from(name)
}

fn remove_partial(partial: &Path) {
    match std::fs::remove_file(partial) {
        Ok(()) => debug!(path = %partial.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %partial.display(), error = %e, "Failed to remove partial download"),
    }
}

async fn fetch(
    client: &Client,
    url: &Url,
    partial: &Path,
    destination: &Path,
    id: DownloadId,
    jobs: &Jobs,
) -> Result<u64, UpdateError> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| format!("HTTP {}", status));
        return Err(UpdateError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let total = response.content_length();
    update(jobs, id, |p| {
        p.total = total;
        p.status = DownloadStatus::Running;
    });

    if let Some(dir) = destination.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let mut file = tokio::fs::File::create(partial).await?;

    let mut downloaded = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        update(jobs, id, |p| p.downloaded = downloaded);
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(partial, destination).await?;
    Ok(downloaded)
}

fn update(jobs: &Jobs, id: DownloadId, f: impl FnOnce(&mut DownloadProgress)) {
    if let Some(job) = jobs.lock().get_mut(&id) {
        f(&mut job.progress);
    }
}
