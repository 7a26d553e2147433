//! Mock transport, registry and probe for testing

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::{
    DeviceProbe, PairedDevice, PairedDeviceRegistry, Transport, TransportError, TransportKind,
};

enum Chunk {
    Data(Vec<u8>),
    Eof,
    Error(String),
}

#[derive(Default)]
struct MockState {
    chunks: VecDeque<Chunk>,
    closed: bool,
}

/// In-memory transport fed by the test
///
/// `read` blocks until a chunk is injected or the transport is closed,
/// which mirrors how a real socket read is only unblocked by data or by
/// closing the handle.
pub struct MockTransport {
    name: String,
    state: Mutex<MockState>,
    ready: Condvar,
    reads: AtomicUsize,
}

impl MockTransport {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(MockState::default()),
            ready: Condvar::new(),
            reads: AtomicUsize::new(0),
        })
    }

    /// Queue bytes for the next read
    pub fn inject(&self, data: impl AsRef<[u8]>) {
        self.push(Chunk::Data(data.as_ref().to_vec()));
    }

    /// Make the next read report end of stream
    pub fn inject_eof(&self) {
        self.push(Chunk::Eof);
    }

    /// Make the next read fail
    pub fn inject_error(&self, message: impl Into<String>) {
        self.push(Chunk::Error(message.into()));
    }

    /// Number of completed `read` calls
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn push(&self, chunk: Chunk) {
        self.state.lock().chunks.push_back(chunk);
        self.ready.notify_all();
    }
}

impl Transport for MockTransport {
    fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(TransportError::ConnectionClosed);
            }
            if let Some(chunk) = state.chunks.pop_front() {
                self.reads.fetch_add(1, Ordering::SeqCst);
                return match chunk {
                    Chunk::Data(mut data) => {
                        let n = data.len().min(buf.len());
                        buf[..n].copy_from_slice(&data[..n]);
                        if n < data.len() {
                            // Keep the remainder for the next read
                            let rest = data.split_off(n);
                            state.chunks.push_front(Chunk::Data(rest));
                        }
                        Ok(n)
                    }
                    Chunk::Eof => Ok(0),
                    Chunk::Error(msg) => Err(TransportError::ReceiveFailed(msg)),
                };
            }
            self.ready.wait(&mut state);
        }
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    fn is_open(&self) -> bool {
        !self.state.lock().closed
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Mock
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Paired-device registry with a fixed device list
pub struct MockPairedRegistry {
    pub enabled: bool,
    pub permission: bool,
    devices: Vec<PairedDevice>,
    streams: Mutex<HashMap<String, Arc<MockTransport>>>,
    opened: Mutex<Vec<String>>,
}

impl MockPairedRegistry {
    pub fn new(devices: Vec<PairedDevice>) -> Self {
        Self {
            enabled: true,
            permission: true,
            devices,
            streams: Mutex::new(HashMap::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a device list given as `(name, address)` pairs
    pub fn with_devices(devices: &[(&str, &str)]) -> Self {
        Self::new(
            devices
                .iter()
                .map(|(name, address)| PairedDevice {
                    name: name.to_string(),
                    address: address.to_string(),
                })
                .collect(),
        )
    }

    /// Transport handed out when `address` is opened. Without one, opening
    /// fails with a connect error.
    pub fn set_stream(&self, address: &str, transport: Arc<MockTransport>) {
        self.streams.lock().insert(address.to_string(), transport);
    }

    /// Addresses passed to `open_stream`, in call order
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

impl PairedDeviceRegistry for MockPairedRegistry {
    fn adapter_enabled(&self) -> bool {
        self.enabled
    }

    fn has_connect_permission(&self) -> bool {
        self.permission
    }

    fn list_paired(&self) -> Result<Vec<PairedDevice>, TransportError> {
        Ok(self.devices.clone())
    }

    fn open_stream(
        &self,
        address: &str,
        _service_uuid: &str,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        self.opened.lock().push(address.to_string());
        match self.streams.lock().get(address) {
            Some(transport) => Ok(transport.clone() as Arc<dyn Transport>),
            None => Err(TransportError::ConnectionFailed(format!(
                "{} refused connection",
                address
            ))),
        }
    }
}

/// Device probe over a fixed set of readable paths
#[derive(Default)]
pub struct MockDeviceProbe {
    devices: Mutex<HashMap<PathBuf, Arc<MockTransport>>>,
    probed: Mutex<Vec<PathBuf>>,
}

impl MockDeviceProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, path: impl Into<PathBuf>, transport: Arc<MockTransport>) {
        self.devices.lock().insert(path.into(), transport);
    }

    /// Paths passed to `is_readable`, in call order
    pub fn probed(&self) -> Vec<PathBuf> {
        self.probed.lock().clone()
    }
}

impl DeviceProbe for MockDeviceProbe {
    fn is_readable(&self, path: &Path) -> bool {
        self.probed.lock().push(path.to_path_buf());
        self.devices.lock().contains_key(path)
    }

    fn open(&self, path: &Path) -> Result<Arc<dyn Transport>, TransportError> {
        self.devices
            .lock()
            .get(path)
            .map(|t| t.clone() as Arc<dyn Transport>)
            .ok_or_else(|| TransportError::NotFound(path.display().to_string()))
    }
}
