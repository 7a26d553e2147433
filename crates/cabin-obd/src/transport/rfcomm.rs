//! Paired wireless serial adapters
//!
//! The platform's paired-device registry is an external collaborator; this
//! module only defines the narrow interface the discovery policy needs and
//! a Linux provider that maps paired devices onto bound RFCOMM device
//! nodes (`rfcomm bind`), which behave like any other serial tty.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::chardev::CharDeviceTransport;
use super::{Transport, TransportError, TransportKind};

/// Serial Port Profile service class identifier
pub const SERIAL_PORT_PROFILE_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

/// A previously paired wireless device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedDevice {
    /// Display name (may be empty when the registry has none)
    #[serde(default)]
    pub name: String,
    /// Hardware address, e.g. `00:1D:A5:68:98:8B`
    pub address: String,
}

/// Registry of paired wireless devices
pub trait PairedDeviceRegistry: Send + Sync {
    /// Whether an adapter is present and powered
    fn adapter_enabled(&self) -> bool;

    /// Whether the runtime grant needed to connect is held
    fn has_connect_permission(&self) -> bool;

    /// Paired devices in registry order
    fn list_paired(&self) -> Result<Vec<PairedDevice>, TransportError>;

    /// Open a connection-oriented stream to the device over the given
    /// service profile
    fn open_stream(
        &self,
        address: &str,
        service_uuid: &str,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Paired device bound to a local RFCOMM device node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfcommBinding {
    #[serde(flatten)]
    pub device: PairedDevice,
    /// Bound device node, e.g. `/dev/rfcomm0`
    pub device_path: PathBuf,
}

/// Linux registry backed by a static table of bound RFCOMM nodes
///
/// The adapter counts as enabled when at least one binding is configured.
/// Connecting opens the node; the kernel establishes the RFCOMM channel on
/// first open.
#[derive(Debug, Clone, Default)]
pub struct StaticRfcommRegistry {
    bindings: Vec<RfcommBinding>,
}

impl StaticRfcommRegistry {
    pub fn new(bindings: Vec<RfcommBinding>) -> Self {
        Self { bindings }
    }

    fn binding_for(&self, address: &str) -> Option<&RfcommBinding> {
        self.bindings
            .iter()
            .find(|b| b.device.address.eq_ignore_ascii_case(address))
    }
}

impl PairedDeviceRegistry for StaticRfcommRegistry {
    fn adapter_enabled(&self) -> bool {
        !self.bindings.is_empty()
    }

    fn has_connect_permission(&self) -> bool {
        true
    }

    fn list_paired(&self) -> Result<Vec<PairedDevice>, TransportError> {
        Ok(self.bindings.iter().map(|b| b.device.clone()).collect())
    }

    fn open_stream(
        &self,
        address: &str,
        service_uuid: &str,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let binding = self
            .binding_for(address)
            .ok_or_else(|| TransportError::NotFound(format!("No binding for {}", address)))?;

        debug!(address, service_uuid, path = %binding.device_path.display(), "Connecting RFCOMM");
        let transport = open_bound_node(&binding.device_path).map_err(|e| match e {
            TransportError::PermissionDenied(msg) => TransportError::PermissionDenied(msg),
            other => TransportError::ConnectionFailed(format!("{}: {}", address, other)),
        })?;

        info!(address, name = %binding.device.name, "RFCOMM connected");
        Ok(Arc::new(transport))
    }
}

fn open_bound_node(path: &Path) -> Result<CharDeviceTransport, TransportError> {
    CharDeviceTransport::open(path, TransportKind::Rfcomm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(name: &str, address: &str, path: &str) -> RfcommBinding {
        RfcommBinding {
            device: PairedDevice {
                name: name.into(),
                address: address.into(),
            },
            device_path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_empty_registry_is_disabled() {
        let registry = StaticRfcommRegistry::default();
        assert!(!registry.adapter_enabled());
        assert!(registry.list_paired().unwrap().is_empty());
    }

    #[test]
    fn test_open_unknown_address() {
        let registry =
            StaticRfcommRegistry::new(vec![binding("OBDII", "AA:BB:CC:DD:EE:FF", "/dev/rfcomm0")]);
        let err = registry
            .open_stream("11:22:33:44:55:66", SERIAL_PORT_PROFILE_UUID)
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::NotFound(_)));
    }

    #[test]
    fn test_open_missing_node_is_connect_failure() {
        let registry = StaticRfcommRegistry::new(vec![binding(
            "OBDII",
            "AA:BB:CC:DD:EE:FF",
            "/nonexistent/rfcomm9",
        )]);
        let err = registry
            .open_stream("aa:bb:cc:dd:ee:ff", SERIAL_PORT_PROFILE_UUID)
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));
    }

    #[test]
    fn test_open_bound_node() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let registry = StaticRfcommRegistry::new(vec![binding(
            "ELM327",
            "AA:BB:CC:DD:EE:FF",
            tmp.path().to_str().unwrap(),
        )]);
        let transport = registry
            .open_stream("AA:BB:CC:DD:EE:FF", SERIAL_PORT_PROFILE_UUID)
            .unwrap();
        assert_eq!(transport.kind(), TransportKind::Rfcomm);
        assert!(transport.is_open());
    }
}
