//! Byte-stream transports to OBD adapters
//!
//! This module provides the transports the discovery policy can hand out:
//! - RFCOMM stream to a paired wireless adapter
//! - Local character device (USB/UART serial)
//! - Mock transport for testing
//!
//! # Example
//!
//! ```ignore
//! use cabin_obd::transport::{DeviceProbe, FsDeviceProbe};
//!
//! let probe = FsDeviceProbe;
//! let transport = probe.open(Path::new("/dev/ttyUSB0"))?;
//! let mut buf = [0u8; 1024];
//! let n = transport.read(&mut buf)?;
//! ```

mod adapter;
pub mod chardev;
pub mod error;
pub mod mock;
pub mod rfcomm;

pub use adapter::{Transport, TransportKind};
pub use chardev::{CharDeviceTransport, DeviceProbe, FsDeviceProbe};
pub use error::TransportError;
pub use rfcomm::{
    PairedDevice, PairedDeviceRegistry, RfcommBinding, StaticRfcommRegistry,
    SERIAL_PORT_PROFILE_UUID,
};
