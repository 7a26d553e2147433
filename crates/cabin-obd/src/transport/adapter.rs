//! Transport trait and types

use std::fmt;

use super::TransportError;

/// Which provider opened a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Serial-profile socket to a paired wireless adapter
    Rfcomm,
    /// Local character device (USB/UART serial)
    CharDevice,
    /// In-memory transport for testing
    Mock,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Rfcomm => "rfcomm",
            TransportKind::CharDevice => "chardev",
            TransportKind::Mock => "mock",
        };
        f.write_str(s)
    }
}

/// A readable, closable byte channel to a device
///
/// `read` blocks until data is available. `close` may be called from any
/// thread while a read is in flight and is the only way to unblock it.
/// Closing twice is harmless.
pub trait Transport: Send + Sync {
    /// Read up to `buf.len()` bytes
    ///
    /// `Ok(0)` means end of stream. Reads after `close` fail with
    /// [`TransportError::ConnectionClosed`].
    fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Release the underlying OS handle
    fn close(&self);

    fn is_open(&self) -> bool;

    fn kind(&self) -> TransportKind;

    /// Human-readable endpoint (device path or adapter address)
    fn describe(&self) -> String;
}
