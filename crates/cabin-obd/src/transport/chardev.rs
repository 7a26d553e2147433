//! Local character-device transport
//!
//! Serial adapters exposed as device nodes (`/dev/ttyUSB0`, bound
//! `/dev/rfcommN`, ...) are opened read-only and read directly; there is
//! no pairing or handshake.
//!
//! Reads wait on `poll(2)` in short slices rather than blocking in
//! `read(2)`, so a `close` from another thread is noticed within one slice
//! and the descriptor is released instead of staying pinned by the reader.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::{Transport, TransportError, TransportKind};

/// Longest a read waits before re-checking whether the transport was closed
const CLOSE_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Probe for local device files
pub trait DeviceProbe: Send + Sync {
    /// Whether the path exists and can be opened for reading
    fn is_readable(&self, path: &Path) -> bool;

    fn open(&self, path: &Path) -> Result<Arc<dyn Transport>, TransportError>;
}

/// [`DeviceProbe`] backed by the real filesystem
#[derive(Debug, Clone, Default)]
pub struct FsDeviceProbe;

impl DeviceProbe for FsDeviceProbe {
    fn is_readable(&self, path: &Path) -> bool {
        path.exists() && OpenOptions::new().read(true).open(path).is_ok()
    }

    fn open(&self, path: &Path) -> Result<Arc<dyn Transport>, TransportError> {
        let transport = CharDeviceTransport::open(path, TransportKind::CharDevice)?;
        Ok(Arc::new(transport))
    }
}

/// Transport over an open device file
pub struct CharDeviceTransport {
    path: PathBuf,
    kind: TransportKind,
    // Readers clone the Arc and poll without holding the lock, so `close`
    // never waits on a read. The descriptor is released when the last
    // clone drops, at the latest one check interval after `close`.
    file: Mutex<Option<Arc<File>>>,
}

impl CharDeviceTransport {
    pub fn open(path: &Path, kind: TransportKind) -> Result<Self, TransportError> {
        let file = OpenOptions::new().read(true).open(path)?;
        debug!(path = %path.display(), %kind, "Opened device file");
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            file: Mutex::new(Some(Arc::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transport for CharDeviceTransport {
    fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        loop {
            let file = self
                .file
                .lock()
                .clone()
                .ok_or(TransportError::ConnectionClosed)?;
            if !wait_readable(&file, CLOSE_CHECK_INTERVAL)? {
                continue;
            }
            // Closed while waiting: drop our clone instead of consuming bytes
            if self.file.lock().is_none() {
                return Err(TransportError::ConnectionClosed);
            }
            let n = (&*file).read(buf)?;
            return Ok(n);
        }
    }

    fn close(&self) {
        if self.file.lock().take().is_some() {
            debug!(path = %self.path.display(), "Closed device file");
        }
    }

    fn is_open(&self) -> bool {
        self.file.lock().is_some()
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Wait until `file` has data, end of stream or an error pending
///
/// `Ok(false)` when the timeout passed (or a signal interrupted the wait)
/// with nothing to read.
fn wait_readable(file: &File, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    // SAFETY: a single valid pollfd; `file` keeps the descriptor open for
    // the duration of the call
    let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    if ready < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    // POLLHUP/POLLERR also count: the following read reports EOF or the error
    Ok(ready > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::io::Write;
    use std::os::unix::ffi::OsStrExt;

    fn make_fifo(path: &Path) {
        let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);
    }

    #[test]
    fn test_read_then_close() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"41 0C 1A F8\r\n").unwrap();

        let transport = CharDeviceTransport::open(tmp.path(), TransportKind::CharDevice).unwrap();
        let mut buf = [0u8; 64];
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"41 0C 1A F8\r\n");
        assert_eq!(transport.read(&mut buf).unwrap(), 0);

        transport.close();
        transport.close();
        assert!(!transport.is_open());
        assert_eq!(
            transport.read(&mut buf).unwrap_err(),
            TransportError::ConnectionClosed
        );
    }

    #[test]
    fn test_close_unblocks_pending_read() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("obd.fifo");
        make_fifo(&fifo);
        // Held open so the reader never sees end of stream
        let _writer = OpenOptions::new().read(true).write(true).open(&fifo).unwrap();

        let transport =
            Arc::new(CharDeviceTransport::open(&fifo, TransportKind::CharDevice).unwrap());
        let reader = {
            let transport = transport.clone();
            std::thread::spawn(move || {
                let mut buf = [0u8; 16];
                transport.read(&mut buf)
            })
        };

        std::thread::sleep(Duration::from_millis(100));
        let closed_at = std::time::Instant::now();
        transport.close();
        let result = reader.join().unwrap();

        assert_eq!(result.unwrap_err(), TransportError::ConnectionClosed);
        assert!(closed_at.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_probe_missing_path() {
        let probe = FsDeviceProbe;
        assert!(!probe.is_readable(Path::new("/definitely/not/a/tty")));
        assert!(probe.open(Path::new("/definitely/not/a/tty")).is_err());
    }
}
