//! Daemon configuration
//!
//! One TOML file with a section per component:
//!
//! ```toml
//! [obd]
//! device_candidates = ["/dev/ttyUSB0"]
//!
//! [[obd.paired]]
//! name = "OBDLink MX"
//! address = "00:04:3E:12:34:56"
//! device_path = "/dev/rfcomm0"
//!
//! [media]
//! staleness_secs = 30
//!
//! [update]
//! install_command = ["pkexec", "/usr/bin/cabin-install"]
//! release_repo = "cabin/cabin-ui"
//!
//! [bridge]
//! current_version = "1.2.0"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use cabin_media::MediaConfig;
use cabin_obd::ObdConfig;
use cabin_update::UpdateConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Complete daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub obd: ObdConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub update: UpdateConfig,

    /// Facade settings
    #[serde(default)]
    pub bridge: BridgeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Version compared against the latest release when the UI does not
    /// pass one; defaults to the daemon's own version
    #[serde(default)]
    pub current_version: Option<String>,

    /// Whether media session access starts out granted
    #[serde(default = "default_media_access")]
    pub media_access: bool,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            current_version: None,
            media_access: default_media_access(),
        }
    }
}

impl BridgeSettings {
    pub fn current_version(&self) -> &str {
        self.current_version
            .as_deref()
            .unwrap_or(env!("CARGO_PKG_VERSION"))
    }
}

fn default_media_access() -> bool {
    true
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields the defaults; a file that cannot be read or
    /// parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
