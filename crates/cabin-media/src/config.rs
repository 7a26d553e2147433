//! Media configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Age after which the cached snapshot is treated as absent
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    /// Package-name fragments of apps whose notifications trigger a refresh
    #[serde(default = "default_media_app_keywords")]
    pub media_app_keywords: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
            media_app_keywords: default_media_app_keywords(),
        }
    }
}

impl MediaConfig {
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }
}

fn default_staleness_secs() -> u64 {
    30
}

fn default_media_app_keywords() -> Vec<String> {
    [
        "music",
        "spotify",
        "youtube",
        "soundcloud",
        "pandora",
        "deezer",
        "tidal",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: MediaConfig = toml::from_str("staleness_secs = 10").unwrap();
        assert_eq!(config.staleness(), Duration::from_secs(10));
        assert!(config.media_app_keywords.contains(&"spotify".to_string()));
    }
}
