//! Native bridge facade
//!
//! The inbound half of the bridge as the UI surface sees it. Every call
//! is synchronous and answers with a sentinel: failures are logged here and
//! come back as `false` or `"{}"`, never as an error value.
//!
//! The components underneath are async. The facade keeps a handle to the
//! runtime they live on and blocks on it, so its methods must be called
//! from a plain thread (the UI thread), never from a runtime worker.

use std::sync::Arc;

use anyhow::{Context, Result};
use cabin_core::{BridgeError, UiDispatcher, UiSurface};
use cabin_media::{InMemoryRegistry, MediaCache, MediaService, MediaSession, MediaWatcher};
use cabin_obd::{Discovery, ObdSessionManager, ObdStatus};
use cabin_update::{
    check_for_update, CommandInstaller, DownloadSubsystem, HttpDownloader, Installer,
    StartOutcome, UpdateCheck, UpdateCoordinator,
};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::BridgeConfig;

/// Platform collaborators the bridge is assembled from
pub struct BridgeParts {
    pub discovery: Discovery,
    /// Session registry fed by the host
    pub media_registry: Arc<InMemoryRegistry>,
    pub downloads: Arc<dyn DownloadSubsystem>,
    pub installer: Arc<dyn Installer>,
}

impl BridgeParts {
    /// Linux providers: RFCOMM bindings and device files for OBD, HTTP
    /// downloads and the configured install command
    pub fn linux(config: &BridgeConfig, runtime: &Handle) -> Result<Self> {
        let _guard = runtime.enter();
        let media_registry = Arc::new(InMemoryRegistry::new());
        media_registry.set_access(config.bridge.media_access);
        Ok(Self {
            discovery: Discovery::from_config(&config.obd),
            media_registry,
            downloads: Arc::new(
                HttpDownloader::new(&config.update).context("Failed to build HTTP downloader")?,
            ),
            installer: Arc::new(CommandInstaller::new(config.update.install_command.clone())),
        })
    }
}

struct ReleaseSource {
    client: reqwest::Client,
    api_base: Url,
    repo: String,
    extension: String,
}

pub struct NativeBridge {
    runtime: Handle,
    dispatcher: UiDispatcher,
    obd: ObdSessionManager,
    media: Arc<MediaService>,
    media_registry: Arc<InMemoryRegistry>,
    watcher: MediaWatcher,
    update: UpdateCoordinator,
    releases: Option<ReleaseSource>,
    current_version: String,
}

impl NativeBridge {
    /// Build the bridge with the Linux providers
    pub fn new(config: &BridgeConfig, surface: Arc<dyn UiSurface>, runtime: Handle) -> Result<Self> {
        let parts = BridgeParts::linux(config, &runtime)?;
        Self::with_parts(config, surface, runtime, parts)
    }

    pub fn with_parts(
        config: &BridgeConfig,
        surface: Arc<dyn UiSurface>,
        runtime: Handle,
        parts: BridgeParts,
    ) -> Result<Self> {
        let _guard = runtime.enter();

        let dispatcher = UiDispatcher::spawn_on(&runtime, surface);
        let queue = Arc::new(dispatcher.queue());

        let obd = ObdSessionManager::new(parts.discovery, queue.clone(), &config.obd);

        let media = Arc::new(MediaService::new(
            parts.media_registry.clone(),
            MediaCache::new(config.media.staleness()),
        ));
        let watcher = MediaWatcher::spawn(media.clone(), config.media.media_app_keywords.clone());

        let update = UpdateCoordinator::new(parts.downloads, parts.installer, queue, &config.update);

        let releases = match &config.update.release_repo {
            Some(repo) => Some(release_source(config, repo)?),
            None => None,
        };

        info!(
            artifact = %update.artifact_path().display(),
            release_repo = ?config.update.release_repo,
            "Native bridge ready"
        );

        Ok(Self {
            runtime,
            dispatcher,
            obd,
            media,
            media_registry: parts.media_registry,
            watcher,
            update,
            releases,
            current_version: config.bridge.current_version().to_string(),
        })
    }

    // =========================================================================
    // OBD
    // =========================================================================

    /// Start streaming from an OBD adapter; `false` when none could be
    /// opened or a stream is already running
    pub fn start_obd_stream(&self, target_hint: &str) -> bool {
        match self.runtime.block_on(self.obd.start(target_hint)) {
            Ok(session_id) => {
                debug!(%session_id, "startObdStream accepted");
                true
            }
            Err(e) => {
                report("startObdStream", e);
                false
            }
        }
    }

    pub fn stop_obd_stream(&self) {
        self.runtime.block_on(self.obd.stop());
    }

    pub fn is_obd_stream_running(&self) -> bool {
        self.obd.is_running()
    }

    pub fn obd_status(&self) -> ObdStatus {
        self.obd.status()
    }

    // =========================================================================
    // Media
    // =========================================================================

    /// Now-playing snapshot as JSON, `"{}"` when there is nothing fresh
    pub fn get_current_media(&self) -> String {
        match self.media.current() {
            Ok(snapshot) => snapshot.to_json(),
            Err(e) => {
                report("getCurrentMedia", e);
                "{}".to_string()
            }
        }
    }

    pub fn has_media_access(&self) -> bool {
        self.media.has_access()
    }

    /// Replace the sessions the host reports as active
    pub fn push_media_sessions(&self, sessions: Vec<MediaSession>) {
        self.media_registry.set_sessions(sessions);
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Start downloading an update artifact
    ///
    /// Also `true` when the download was not started because the install
    /// grant had to be requested first.
    pub fn start_update_download(&self, url: &str) -> bool {
        match self.runtime.block_on(self.update.start(url)) {
            Ok(StartOutcome::Enqueued(job)) => {
                debug!(id = %job.id, "startUpdateDownload accepted");
                true
            }
            Ok(StartOutcome::PermissionRequested) => true,
            Err(e) => {
                report("startUpdateDownload", e);
                false
            }
        }
    }

    pub fn is_update_artifact_present(&self) -> bool {
        self.update.artifact_present()
    }

    /// Compare the latest release with `current` (or the configured
    /// version) and answer with an [`UpdateCheck`] as JSON
    pub fn check_for_update(&self, current: Option<&str>) -> String {
        let current = current.unwrap_or(&self.current_version);
        let check = match &self.releases {
            Some(source) => {
                let result = self.runtime.block_on(check_for_update(
                    &source.client,
                    &source.api_base,
                    &source.repo,
                    &source.extension,
                    Some(current),
                ));
                match result {
                    Ok(check) => check,
                    Err(e) => {
                        report("checkForUpdate", e);
                        UpdateCheck::unavailable()
                    }
                }
            }
            None => {
                debug!("No release repository configured");
                UpdateCheck::unavailable()
            }
        };
        serde_json::to_string(&check).unwrap_or_else(|_| "{}".to_string())
    }

    /// Stop the stream, the media watcher, the update observers and the UI
    /// dispatcher. Idempotent.
    pub fn shutdown(&self) {
        self.runtime.block_on(self.obd.stop());
        self.watcher.stop();
        self.update.shutdown();
        self.dispatcher.shutdown();
        info!("Native bridge shut down");
    }
}

fn release_source(config: &BridgeConfig, repo: &str) -> Result<ReleaseSource> {
    let mut base = config.update.release_api.clone();
    // Url::join replaces the last path segment unless the base ends in '/'
    if !base.ends_with('/') {
        base.push('/');
    }
    let api_base =
        Url::parse(&base).with_context(|| format!("Invalid release API URL: {}", base))?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("cabind/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(config.update.connect_timeout())
        .build()
        .context("Failed to build release client")?;
    Ok(ReleaseSource {
        client,
        api_base,
        repo: repo.to_string(),
        extension: config.update.asset_extension.clone(),
    })
}

/// Log a failed call at the boundary
fn report(operation: &'static str, err: impl Into<BridgeError>) {
    let err = err.into();
    if err.is_benign() {
        debug!(operation, kind = err.kind(), "{}", err);
    } else {
        warn!(operation, kind = err.kind(), error = %err, "Bridge call failed");
    }
}
