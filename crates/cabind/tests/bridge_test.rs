//! NativeBridge facade driven from a plain thread, the way the UI host
//! calls it

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cabin_core::testing::RecordingSurface;
use cabin_media::{InMemoryRegistry, MediaSession, Metadata, PlaybackState};
use cabin_obd::Discovery;
use cabin_update::mock::{MockDownloadSubsystem, RecordingInstaller};
use cabin_update::DownloadStatus;
use cabind::{BridgeConfig, BridgeParts, NativeBridge};
use tokio::runtime::Runtime;

// =============================================================================
// Helpers
// =============================================================================

struct Fixture {
    // Declared first so it is dropped before the runtime it runs on
    bridge: NativeBridge,
    surface: Arc<RecordingSurface>,
    registry: Arc<InMemoryRegistry>,
    downloads: Arc<MockDownloadSubsystem>,
    installer: Arc<RecordingInstaller>,
    dir: tempfile::TempDir,
    _runtime: Runtime,
}

fn fixture(configure: impl FnOnce(&mut BridgeConfig, &std::path::Path)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut config = BridgeConfig::default();
    config.obd.device_candidates = vec![dir.path().join("ttyUSB0")];
    config.update.download_dir = dir.path().to_path_buf();
    config.update.poll_interval_ms = 20;
    configure(&mut config, dir.path());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let surface = Arc::new(RecordingSurface::new());
    let registry = Arc::new(InMemoryRegistry::new());
    let downloads = Arc::new(MockDownloadSubsystem::new());
    let installer = Arc::new(RecordingInstaller::new());

    let parts = BridgeParts {
        discovery: Discovery::from_config(&config.obd),
        media_registry: registry.clone(),
        downloads: downloads.clone(),
        installer: installer.clone(),
    };
    let bridge =
        NativeBridge::with_parts(&config, surface.clone(), runtime.handle().clone(), parts)
            .unwrap();

    Fixture {
        bridge,
        surface,
        registry,
        downloads,
        installer,
        dir,
        _runtime: runtime,
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn playing(title: &str) -> MediaSession {
    MediaSession::new("com.spotify.music")
        .with_playback(PlaybackState::Playing, 100)
        .with_metadata(Metadata {
            title: Some(title.into()),
            artist: Some("Artist".into()),
            ..Metadata::default()
        })
}

// =============================================================================
// OBD
// =============================================================================

#[test]
fn test_obd_lines_reach_surface_as_callbacks() {
    let f = fixture(|_, _| {});
    std::fs::write(
        f.dir.path().join("ttyUSB0"),
        b"ELM327 v1.5\r\n41 0C 1A \"F8\"\r\n",
    )
    .unwrap();

    assert!(f.bridge.start_obd_stream(""));
    let scripts = f.surface.wait_for_blocking(2, Duration::from_secs(5));
    assert_eq!(
        scripts,
        vec![
            r#"if(window.onOBDData) window.onOBDData("ELM327 v1.5");"#.to_string(),
            r#"if(window.onOBDData) window.onOBDData("41 0C 1A \"F8\"");"#.to_string(),
        ]
    );

    // A device file ends at EOF, which ends the stream like an I/O failure
    assert!(wait_until(Duration::from_secs(2), || !f
        .bridge
        .is_obd_stream_running()));
    assert!(f.bridge.start_obd_stream(""));
    f.bridge.stop_obd_stream();
    assert!(!f.bridge.is_obd_stream_running());
}

#[test]
fn test_obd_start_without_adapter_returns_false() {
    let f = fixture(|config, dir| {
        config.obd.device_candidates = vec![dir.join("missing0"), dir.join("missing1")];
    });

    assert!(!f.bridge.start_obd_stream("OBDLink"));
    assert!(!f.bridge.is_obd_stream_running());
    // Stopping with nothing running is a no-op
    f.bridge.stop_obd_stream();
    assert!(f.surface.scripts().is_empty());
}

// =============================================================================
// Media
// =============================================================================

#[test]
fn test_media_json_and_cache_fallback() {
    let f = fixture(|_, _| {});
    assert!(f.bridge.has_media_access());
    assert_eq!(f.bridge.get_current_media(), "{}");

    f.bridge.push_media_sessions(vec![playing("Song")]);
    let json: serde_json::Value = serde_json::from_str(&f.bridge.get_current_media()).unwrap();
    assert_eq!(json["title"], "Song");
    assert_eq!(json["artist"], "Artist");
    assert_eq!(json["isPlaying"], true);
    assert_eq!(json["packageName"], "com.spotify.music");

    // Live refresh now fails, the snapshot from a moment ago is still fresh
    f.bridge.push_media_sessions(Vec::new());
    let json: serde_json::Value = serde_json::from_str(&f.bridge.get_current_media()).unwrap();
    assert_eq!(json["title"], "Song");
}

#[test]
fn test_media_without_access_is_empty() {
    let f = fixture(|_, _| {});
    f.registry.set_access(false);
    f.registry.set_sessions(vec![playing("Song")]);

    assert!(!f.bridge.has_media_access());
    assert_eq!(f.bridge.get_current_media(), "{}");
}

// =============================================================================
// Update
// =============================================================================

#[test]
fn test_update_progress_and_install() {
    let f = fixture(|_, _| {});
    let artifact: PathBuf = f.dir.path().join("cabin-latest.pkg");
    std::fs::write(&artifact, b"previous").unwrap();
    assert!(f.bridge.is_update_artifact_present());

    assert!(!f.bridge.start_update_download("not a url"));
    assert!(f.bridge.start_update_download("https://example.com/cabin-1.3.0.pkg"));
    assert!(!f.bridge.is_update_artifact_present());

    let records = f.downloads.enqueued();
    assert_eq!(records.len(), 1);
    let id = records[0].id;

    f.downloads
        .set_progress(id, 50, Some(100), DownloadStatus::Running);
    assert!(wait_until(Duration::from_secs(5), || f
        .surface
        .scripts()
        .iter()
        .any(|s| s == "if(window.onDownloadProgress) window.onDownloadProgress(50);")));

    f.downloads.finish(id, DownloadStatus::Succeeded, b"cabin 1.3.0");
    assert!(wait_until(Duration::from_secs(5), || f.installer.installs().len() == 1));
    assert_eq!(f.installer.installs(), vec![artifact.clone()]);
    assert!(f.bridge.is_update_artifact_present());
    assert_eq!(std::fs::read(&artifact).unwrap(), b"cabin 1.3.0");
}

#[test]
fn test_update_requests_permission_instead_of_downloading() {
    let f = fixture(|config, _| config.update.require_install_permission = true);
    f.installer.set_permitted(false);

    assert!(f.bridge.start_update_download("https://example.com/cabin.pkg"));
    assert_eq!(f.installer.permission_requests(), 1);
    assert!(f.downloads.enqueued().is_empty());
}

#[test]
fn test_update_unavailable_subsystem_returns_false() {
    let f = fixture(|_, _| {});
    f.downloads.set_available(false);
    assert!(!f.bridge.start_update_download("https://example.com/cabin.pkg"));
}

#[test]
fn test_check_for_update_without_repository() {
    let f = fixture(|_, _| {});
    assert_eq!(f.bridge.check_for_update(Some("1.0.0")), r#"{"available":false}"#);
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn test_shutdown_is_idempotent() {
    let f = fixture(|_, _| {});
    f.bridge.shutdown();
    f.bridge.shutdown();

    assert!(!f.bridge.is_obd_stream_running());
    assert_eq!(f.bridge.get_current_media(), "{}");
}
