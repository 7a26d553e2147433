//! Media session model
//!
//! A session is what the platform session registry reports for one
//! playing (or recently playing) app: its playback state and the metadata
//! of the current item. Both may be missing.

use serde::{Deserialize, Serialize};

/// Playback state of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Buffering,
    Paused,
    Stopped,
    #[default]
    Other,
}

impl PlaybackState {
    /// Map a platform state code (`STATE_STOPPED` = 1, `STATE_PAUSED` = 2,
    /// `STATE_PLAYING` = 3, `STATE_BUFFERING` = 6)
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => PlaybackState::Stopped,
            2 => PlaybackState::Paused,
            3 => PlaybackState::Playing,
            6 => PlaybackState::Buffering,
            _ => PlaybackState::Other,
        }
    }

    /// Playing or buffering; such a session is selected unconditionally
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Buffering)
    }
}

/// Playback part of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playback {
    #[serde(default)]
    pub state: PlaybackState,
    /// Position in milliseconds, negative when unknown
    #[serde(default = "unknown_position")]
    pub position_ms: i64,
    #[serde(default)]
    pub speed: f32,
    /// When the position was last updated (milliseconds, monotonic clock)
    #[serde(default)]
    pub last_position_update: i64,
}

fn unknown_position() -> i64 {
    -1
}

/// Metadata of the current item
///
/// The display variants are what the app wants shown when it does not
/// provide the primary fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub display_title: Option<String>,
    pub display_subtitle: Option<String>,
    pub display_description: Option<String>,
    /// Duration in milliseconds, 0 when unknown
    pub duration_ms: i64,
}

/// One active media session as reported by the registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaSession {
    pub package_name: Option<String>,
    pub playback: Option<Playback>,
    pub metadata: Option<Metadata>,
}

impl MediaSession {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: Some(package_name.into()),
            ..Self::default()
        }
    }

    pub fn with_playback(mut self, state: PlaybackState, last_position_update: i64) -> Self {
        self.playback = Some(Playback {
            state,
            position_ms: unknown_position(),
            speed: 0.0,
            last_position_update,
        });
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn state(&self) -> Option<PlaybackState> {
        self.playback.as_ref().map(|p| p.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        assert_eq!(PlaybackState::from_code(3), PlaybackState::Playing);
        assert_eq!(PlaybackState::from_code(6), PlaybackState::Buffering);
        assert_eq!(PlaybackState::from_code(2), PlaybackState::Paused);
        assert_eq!(PlaybackState::from_code(1), PlaybackState::Stopped);
        // Connecting, skipping, error...
        assert_eq!(PlaybackState::from_code(8), PlaybackState::Other);
        assert!(PlaybackState::Buffering.is_active());
        assert!(!PlaybackState::Paused.is_active());
    }

    #[test]
    fn test_session_from_json() {
        let session: MediaSession = serde_json::from_str(
            r#"{
                "packageName": "com.spotify.music",
                "playback": {"state": "paused", "lastPositionUpdate": 42},
                "metadata": {"title": "Song", "durationMs": 180000}
            }"#,
        )
        .unwrap();

        assert_eq!(session.state(), Some(PlaybackState::Paused));
        let playback = session.playback.unwrap();
        assert_eq!(playback.position_ms, -1);
        assert_eq!(playback.last_position_update, 42);
        let metadata = session.metadata.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Song"));
        assert_eq!(metadata.artist, None);
    }
}
