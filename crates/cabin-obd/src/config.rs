//! OBD configuration
//!
//! Discovery candidates, framing limits and stop timing.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::{RfcommBinding, SERIAL_PORT_PROFILE_UUID};

/// Configuration for OBD discovery and streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObdConfig {
    /// Local device paths probed in order when no paired adapter matches
    #[serde(default = "default_device_candidates")]
    pub device_candidates: Vec<PathBuf>,
    /// Case-insensitive name fragments that identify an OBD adapter
    #[serde(default = "default_name_keywords")]
    pub name_keywords: Vec<String>,
    /// Service profile used to connect to paired adapters
    #[serde(default = "default_service_uuid")]
    pub serial_profile_uuid: String,
    /// Paired adapters bound to RFCOMM device nodes (Linux provider)
    #[serde(default)]
    pub paired: Vec<RfcommBinding>,
    /// Framing settings
    #[serde(default)]
    pub framing: FramingConfig,
    /// Bounded wait for the read worker when stopping
    #[serde(default = "default_stop_join_timeout")]
    pub stop_join_timeout_ms: u64,
}

impl Default for ObdConfig {
    fn default() -> Self {
        Self {
            device_candidates: default_device_candidates(),
            name_keywords: default_name_keywords(),
            serial_profile_uuid: default_service_uuid(),
            paired: Vec::new(),
            framing: FramingConfig::default(),
            stop_join_timeout_ms: default_stop_join_timeout(),
        }
    }
}

impl ObdConfig {
    pub fn stop_join_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_join_timeout_ms)
    }
}

fn default_device_candidates() -> Vec<PathBuf> {
    [
        "/dev/ttyUSB0",
        "/dev/ttyUSB1",
        "/dev/ttyS0",
        "/dev/ttyS1",
        "/dev/ttyMT1",
        "/dev/ttyMT2",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn default_name_keywords() -> Vec<String> {
    vec!["elm".to_string(), "obd".to_string()]
}

fn default_service_uuid() -> String {
    SERIAL_PORT_PROFILE_UUID.to_string()
}

fn default_stop_join_timeout() -> u64 {
    200
}

/// Line framing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramingConfig {
    /// Line delimiter byte
    #[serde(default = "default_delimiter")]
    pub delimiter: u8,
    /// Size of each read from the transport
    #[serde(default = "default_read_chunk")]
    pub read_chunk_bytes: usize,
    /// Longest line accepted before the stream is failed
    #[serde(default = "default_max_line")]
    pub max_line_bytes: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            read_chunk_bytes: default_read_chunk(),
            max_line_bytes: default_max_line(),
        }
    }
}

fn default_delimiter() -> u8 {
    b'\n'
}

fn default_read_chunk() -> usize {
    1024
}

fn default_max_line() -> usize {
    4096
}
