//! Now-playing snapshot
//!
//! Immutable value built from the selected session. It is what
//! `getCurrentMedia` returns to the UI, serialized as a flat JSON object:
//!
//! ```text
//! {"title":"..","artist":"..","album":"..","description":"..",
//!  "duration":180000,"position":42000,"isPlaying":true,"isPaused":false,
//!  "isStopped":false,"speed":1.0,"packageName":"com.spotify.music"}
//! ```
//!
//! Optional fields are omitted when unknown; the three state flags are
//! always present.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::session::{MediaSession, PlaybackState};

#[derive(Debug, Clone, PartialEq)]
pub struct MediaSnapshot {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub description: Option<String>,
    pub duration_ms: Option<i64>,
    pub position_ms: Option<i64>,
    pub state: PlaybackState,
    pub speed: Option<f32>,
    pub package_name: Option<String>,
}

impl MediaSnapshot {
    /// Build a snapshot from a session. `None` when the session has no
    /// metadata.
    ///
    /// Primary fields win; display variants fill only what is missing.
    /// The display description has no primary counterpart.
    pub fn from_session(session: &MediaSession) -> Option<Self> {
        let metadata = session.metadata.as_ref()?;

        let mut snapshot = Self {
            title: metadata.title.clone().or_else(|| metadata.display_title.clone()),
            artist: metadata
                .artist
                .clone()
                .or_else(|| metadata.display_subtitle.clone()),
            album: metadata.album.clone(),
            description: metadata.display_description.clone(),
            duration_ms: (metadata.duration_ms > 0).then_some(metadata.duration_ms),
            position_ms: None,
            state: PlaybackState::Other,
            speed: None,
            package_name: session.package_name.clone(),
        };

        if let Some(playback) = &session.playback {
            snapshot.state = playback.state;
            snapshot.position_ms = (playback.position_ms >= 0).then_some(playback.position_ms);
            snapshot.speed = (playback.speed != 0.0).then_some(playback.speed);
        }

        Some(snapshot)
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PlaybackState::Stopped
    }

    /// Serialize for the UI surface
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for MediaSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(title) = &self.title {
            map.serialize_entry("title", title)?;
        }
        if let Some(artist) = &self.artist {
            map.serialize_entry("artist", artist)?;
        }
        if let Some(album) = &self.album {
            map.serialize_entry("album", album)?;
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        if let Some(duration) = self.duration_ms {
            map.serialize_entry("duration", &duration)?;
        }
        if let Some(position) = self.position_ms {
            map.serialize_entry("position", &position)?;
        }
        map.serialize_entry("isPlaying", &self.is_playing())?;
        map.serialize_entry("isPaused", &self.is_paused())?;
        map.serialize_entry("isStopped", &self.is_stopped())?;
        if let Some(speed) = self.speed {
            map.serialize_entry("speed", &speed)?;
        }
        if let Some(package) = &self.package_name {
            map.serialize_entry("packageName", package)?;
        }
        map.end()
    }
}
