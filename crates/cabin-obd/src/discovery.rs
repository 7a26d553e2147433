//! OBD transport discovery
//!
//! Policy, first match wins:
//! 1. Paired wireless adapters (when the adapter is enabled): a device
//!    matches when the target hint is a substring of its name or equals its
//!    address, or when its name contains one of the OBD name keywords.
//! 2. Local character devices, probed in configured order.
//! 3. Otherwise [`ObdError::NotFound`].
//!
//! No retries happen here; retry policy belongs to the caller.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ObdConfig;
use crate::error::ObdError;
use crate::transport::{
    DeviceProbe, FsDeviceProbe, PairedDevice, PairedDeviceRegistry, StaticRfcommRegistry, Transport,
    TransportError,
};

/// Which discovery rule selected the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySource {
    /// Paired device matched the caller's hint (name substring or address)
    TargetHint { name: String, address: String },
    /// Paired device matched an OBD name keyword
    NameKeyword { name: String, address: String },
    /// Local device file
    DevicePath(PathBuf),
}

/// Result of a successful discovery
pub struct Discovered {
    pub transport: Arc<dyn Transport>,
    pub source: DiscoverySource,
}

impl std::fmt::Debug for Discovered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovered")
            .field("transport", &self.transport.describe())
            .field("source", &self.source)
            .finish()
    }
}

/// How a paired device matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    TargetHint,
    NameKeyword,
}

/// Decide whether a paired device is an acceptable OBD adapter
///
/// The hint is matched case-sensitively against the name and exactly
/// against the address; keywords are matched case-insensitively.
pub fn match_device(device: &PairedDevice, hint: &str, keywords: &[String]) -> Option<MatchRule> {
    if !hint.is_empty() && (device.name.contains(hint) || device.address == hint) {
        return Some(MatchRule::TargetHint);
    }
    let lower = device.name.to_lowercase();
    if keywords
        .iter()
        .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
    {
        return Some(MatchRule::NameKeyword);
    }
    None
}

/// First acceptable paired device in registry order
pub fn select_paired<'a>(
    devices: &'a [PairedDevice],
    hint: &str,
    keywords: &[String],
) -> Option<(&'a PairedDevice, MatchRule)> {
    devices
        .iter()
        .find_map(|d| match_device(d, hint, keywords).map(|rule| (d, rule)))
}

/// Discovery policy over a paired-device registry and a device probe
#[derive(Clone)]
pub struct Discovery {
    registry: Option<Arc<dyn PairedDeviceRegistry>>,
    probe: Arc<dyn DeviceProbe>,
    candidates: Vec<PathBuf>,
    keywords: Vec<String>,
    service_uuid: String,
}

impl Discovery {
    /// `registry` is `None` on hosts without a wireless adapter
    pub fn new(
        registry: Option<Arc<dyn PairedDeviceRegistry>>,
        probe: Arc<dyn DeviceProbe>,
        config: &ObdConfig,
    ) -> Self {
        Self {
            registry,
            probe,
            candidates: config.device_candidates.clone(),
            keywords: config.name_keywords.clone(),
            service_uuid: config.serial_profile_uuid.clone(),
        }
    }

    /// Discovery over the host: configured RFCOMM bindings (if any) and the
    /// local filesystem
    pub fn from_config(config: &ObdConfig) -> Self {
        let registry: Option<Arc<dyn PairedDeviceRegistry>> = if config.paired.is_empty() {
            None
        } else {
            Some(Arc::new(StaticRfcommRegistry::new(config.paired.clone())))
        };
        Self::new(registry, Arc::new(FsDeviceProbe), config)
    }

    /// Find and open a transport. Blocking (may connect).
    pub fn discover(&self, target_hint: &str) -> Result<Discovered, ObdError> {
        if let Some(found) = self.discover_paired(target_hint)? {
            return Ok(found);
        }

        for path in &self.candidates {
            if !self.probe.is_readable(path) {
                continue;
            }
            match self.probe.open(path) {
                Ok(transport) => {
                    info!(path = %path.display(), "Using local OBD device");
                    return Ok(Discovered {
                        transport,
                        source: DiscoverySource::DevicePath(path.clone()),
                    });
                }
                Err(e) => {
                    // Readable a moment ago but failed to open; try the next one
                    warn!(path = %path.display(), error = %e, "Failed to open device");
                }
            }
        }

        debug!(target_hint, "No OBD transport found");
        Err(ObdError::NotFound)
    }

    /// Returns `Ok(None)` when no paired device matched so the caller can
    /// fall back to local devices. A matched device that fails to connect is
    /// an error, not a fallback.
    fn discover_paired(&self, target_hint: &str) -> Result<Option<Discovered>, ObdError> {
        let Some(registry) = &self.registry else {
            return Ok(None);
        };
        if !registry.adapter_enabled() {
            debug!("Wireless adapter disabled, skipping paired devices");
            return Ok(None);
        }
        if !registry.has_connect_permission() {
            return Err(ObdError::PermissionDenied(
                "connect permission for paired devices not granted".to_string(),
            ));
        }

        let devices = match registry.list_paired() {
            Ok(devices) => devices,
            Err(TransportError::PermissionDenied(msg)) => {
                return Err(ObdError::PermissionDenied(msg));
            }
            Err(e) => {
                warn!(error = %e, "Failed to enumerate paired devices");
                return Ok(None);
            }
        };

        let Some((device, rule)) = select_paired(&devices, target_hint, &self.keywords) else {
            return Ok(None);
        };

        info!(
            name = %device.name,
            address = %device.address,
            rule = ?rule,
            "Matched paired OBD adapter"
        );

        let transport = registry
            .open_stream(&device.address, &self.service_uuid)
            .map_err(|e| match e {
                TransportError::PermissionDenied(msg) => ObdError::PermissionDenied(msg),
                other => ObdError::ConnectFailed {
                    target: device.address.clone(),
                    reason: other.to_string(),
                },
            })?;

        let (name, address) = (device.name.clone(), device.address.clone());
        let source = match rule {
            MatchRule::TargetHint => DiscoverySource::TargetHint { name, address },
            MatchRule::NameKeyword => DiscoverySource::NameKeyword { name, address },
        };
        Ok(Some(Discovered { transport, source }))
    }
}
