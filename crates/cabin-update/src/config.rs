//! Update configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Shared downloads location
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Artifact file name; the same name is reused (and overwritten) by
    /// every update attempt
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Program and arguments; the artifact path is appended
    #[serde(default)]
    pub install_command: Vec<String>,
    /// Refuse to enqueue until the installer reports it may install
    #[serde(default)]
    pub require_install_permission: bool,
    /// `owner/repo` to check for releases
    #[serde(default)]
    pub release_repo: Option<String>,
    #[serde(default = "default_release_api")]
    pub release_api: String,
    /// Extension of the release asset to download
    #[serde(default = "default_asset_extension")]
    pub asset_extension: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            artifact_name: default_artifact_name(),
            poll_interval_ms: default_poll_interval_ms(),
            install_command: Vec::new(),
            require_install_permission: false,
            release_repo: None,
            release_api: default_release_api(),
            asset_extension: default_asset_extension(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl UpdateConfig {
    /// Fixed artifact location
    pub fn artifact_path(&self) -> PathBuf {
        self.download_dir.join(&self.artifact_name)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("cabin-downloads")
}

fn default_artifact_name() -> String {
    "cabin-latest.pkg".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_release_api() -> String {
    "https://api.github.com".to_string()
}

fn default_asset_extension() -> String {
    "pkg".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}
