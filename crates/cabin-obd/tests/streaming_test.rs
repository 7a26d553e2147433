//! End-to-end OBD streaming tests
//!
//! Drive the session manager against device files on disk and mock
//! adapters, and observe what reaches the UI surface.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cabin_core::testing::{RecordingSink, RecordingSurface};
use cabin_core::{UiDispatcher, UiQueue};
use cabin_obd::transport::mock::{MockDeviceProbe, MockPairedRegistry, MockTransport};
use cabin_obd::transport::{PairedDevice, RfcommBinding};
use cabin_obd::{Discovery, DiscoverySource, ObdConfig, ObdSessionManager, Transport};

// =============================================================================
// Helpers
// =============================================================================

fn device_file(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

/// A named pipe stands in for a serial node that blocks until data arrives
fn make_fifo(path: &Path) {
    let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
    assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);
}

async fn wait_for_exit(manager: &ObdSessionManager) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while manager.is_running() {
        assert!(Instant::now() < deadline, "worker did not exit");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Device files
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_streams_local_device_until_eof() {
    let file = device_file(b"ELM327 v1.5\r\n\r\n41 0C 1A F8\r\n41 0D 3C\r\n>");
    let config = ObdConfig {
        device_candidates: vec![PathBuf::from("/nonexistent/ttyUSB9"), file.path().into()],
        ..ObdConfig::default()
    };
    let sink = Arc::new(RecordingSink::new());
    let manager = ObdSessionManager::new(Discovery::from_config(&config), sink.clone(), &config);

    manager.start("").await.unwrap();
    assert_eq!(
        manager.source(),
        Some(DiscoverySource::DevicePath(file.path().into()))
    );

    wait_for_exit(&manager).await;
    // Empty lines are forwarded; the trailing prompt has no delimiter
    assert_eq!(
        sink.obd_lines(),
        vec!["ELM327 v1.5", "", "41 0C 1A F8", "41 0D 3C"]
    );

    manager.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rfcomm_binding_selected_by_hint() {
    let node = device_file(b"SPEED: 42\n");
    let config = ObdConfig {
        device_candidates: vec![],
        paired: vec![
            RfcommBinding {
                device: PairedDevice {
                    name: "Headphones".into(),
                    address: "11:22:33:44:55:66".into(),
                },
                device_path: PathBuf::from("/nonexistent/rfcomm0"),
            },
            RfcommBinding {
                device: PairedDevice {
                    name: "Car Kit".into(),
                    address: "AA:BB:CC:DD:EE:FF".into(),
                },
                device_path: node.path().into(),
            },
        ],
        ..ObdConfig::default()
    };
    let sink = Arc::new(RecordingSink::new());
    let manager = ObdSessionManager::new(Discovery::from_config(&config), sink.clone(), &config);

    manager.start("AA:BB:CC:DD:EE:FF").await.unwrap();
    assert!(matches!(
        manager.source(),
        Some(DiscoverySource::TargetHint { ref name, .. }) if name == "Car Kit"
    ));

    sink.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(sink.obd_lines(), vec!["SPEED: 42"]);
    manager.stop().await;
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_unblocks_pending_read() {
    let adapter = MockTransport::new("elm327");
    let registry = Arc::new(MockPairedRegistry::with_devices(&[(
        "ELM327",
        "00:1D:A5:00:00:01",
    )]));
    registry.set_stream("00:1D:A5:00:00:01", adapter.clone());

    let config = ObdConfig::default();
    let manager = ObdSessionManager::new(
        Discovery::new(Some(registry), Arc::new(MockDeviceProbe::new()), &config),
        Arc::new(RecordingSink::new()),
        &config,
    );

    manager.start("").await.unwrap();
    // Let the worker block in read()
    tokio::time::sleep(Duration::from_millis(20)).await;

    let begun = Instant::now();
    manager.stop().await;
    assert!(begun.elapsed() < config.stop_join_timeout());
    assert!(!manager.is_running());
    assert!(!adapter.is_open());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_releases_blocking_device_node() {
    let dir = tempfile::tempdir().unwrap();
    let node = dir.path().join("ttyOBD0");
    make_fifo(&node);
    // Opened read-write so a writer is attached and no open blocks
    let mut adapter = OpenOptions::new().read(true).write(true).open(&node).unwrap();

    let config = ObdConfig {
        device_candidates: vec![node.clone()],
        ..ObdConfig::default()
    };
    let sink = Arc::new(RecordingSink::new());
    let manager = ObdSessionManager::new(Discovery::from_config(&config), sink.clone(), &config);

    manager.start("").await.unwrap();
    adapter.write_all(b"first\n").unwrap();
    sink.wait_for(1, Duration::from_secs(2)).await;

    let begun = Instant::now();
    manager.stop().await;
    assert!(begun.elapsed() < config.stop_join_timeout());
    assert!(!manager.is_running());

    // Nothing is left reading the node once stop() returned
    adapter.write_all(b"after-stop\n").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sink.obd_lines(), vec!["first"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_then_start_opens_new_transport() {
    let probe = Arc::new(MockDeviceProbe::new());
    let first = MockTransport::new("first");
    probe.add_device("/dev/ttyUSB0", first.clone());

    let config = ObdConfig::default();
    let manager = ObdSessionManager::new(
        Discovery::new(None, probe.clone(), &config),
        Arc::new(RecordingSink::new()),
        &config,
    );

    let a = manager.start("").await.unwrap();
    manager.stop().await;
    assert!(!first.is_open());

    let second = MockTransport::new("second");
    probe.add_device("/dev/ttyUSB0", second.clone());
    let b = manager.start("").await.unwrap();
    assert_ne!(a, b);
    assert!(second.is_open());
    manager.stop().await;
}

// =============================================================================
// UI delivery
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_lines_reach_surface_as_callbacks() {
    let surface = Arc::new(RecordingSurface::new());
    let dispatcher = UiDispatcher::spawn(surface.clone());
    let queue: UiQueue = dispatcher.queue();

    let adapter = MockTransport::new("usb");
    let probe = Arc::new(MockDeviceProbe::new());
    probe.add_device("/dev/ttyUSB0", adapter.clone());
    let config = ObdConfig::default();
    let manager = ObdSessionManager::new(
        Discovery::new(None, probe, &config),
        Arc::new(queue),
        &config,
    );

    manager.start("").await.unwrap();
    adapter.inject(b"RPM \"idle\"\n");
    let scripts = surface.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(
        scripts,
        vec![r#"if(window.onOBDData) window.onOBDData("RPM \"idle\"");"#.to_string()]
    );

    manager.stop().await;
    dispatcher.shutdown();
}
