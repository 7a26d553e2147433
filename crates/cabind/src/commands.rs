//! Line protocol between the UI host and the daemon
//!
//! One command per stdin line, named after the UI-facing call:
//!
//! ```text
//! startObdStream OBDLink
//! isObdStreamRunning
//! getCurrentMedia
//! mediaSession {"packageName":"com.spotify.music","playback":{"state":"playing"}}
//! startUpdateDownload https://example.com/cabin-1.3.0.pkg
//! quit
//! ```
//!
//! Each command answers with exactly one stdout line.

use cabin_media::MediaSession;
use thiserror::Error;

use crate::bridge::NativeBridge;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),

    #[error("Invalid media sessions: {0}")]
    InvalidSessions(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartObdStream(String),
    StopObdStream,
    IsObdStreamRunning,
    ObdStatus,
    GetCurrentMedia,
    HasMediaAccess,
    MediaSessions(Vec<MediaSession>),
    StartUpdateDownload(String),
    IsUpdateArtifactPresent,
    CheckForUpdate(Option<String>),
    Quit,
}

/// What the command loop does after a command ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Line(String),
    Quit,
}

/// Parse one input line; `Ok(None)` for a blank line
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let command = match name {
        // The hint may be empty: any paired OBD adapter, then device files
        "startObdStream" => Command::StartObdStream(arg.to_string()),
        "stopObdStream" => Command::StopObdStream,
        "isObdStreamRunning" => Command::IsObdStreamRunning,
        "obdStatus" => Command::ObdStatus,
        "getCurrentMedia" => Command::GetCurrentMedia,
        "hasMediaAccess" => Command::HasMediaAccess,
        "mediaSession" => Command::MediaSessions(parse_sessions(arg)?),
        "startUpdateDownload" => {
            if arg.is_empty() {
                return Err(CommandError::MissingArgument("startUpdateDownload"));
            }
            Command::StartUpdateDownload(arg.to_string())
        }
        "isUpdateArtifactPresent" => Command::IsUpdateArtifactPresent,
        "checkForUpdate" => Command::CheckForUpdate((!arg.is_empty()).then(|| arg.to_string())),
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// A single session object or an array of them; empty clears the list
fn parse_sessions(arg: &str) -> Result<Vec<MediaSession>, CommandError> {
    if arg.is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value = serde_json::from_str(arg)?;
    let sessions = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(sessions)
}

impl Command {
    pub fn run(self, bridge: &NativeBridge) -> Reply {
        let line = match self {
            Command::StartObdStream(hint) => bridge.start_obd_stream(&hint).to_string(),
            Command::StopObdStream => {
                bridge.stop_obd_stream();
                "ok".to_string()
            }
            Command::IsObdStreamRunning => bridge.is_obd_stream_running().to_string(),
            Command::ObdStatus => {
                serde_json::to_string(&bridge.obd_status()).unwrap_or_else(|_| "{}".to_string())
            }
            Command::GetCurrentMedia => bridge.get_current_media(),
            Command::HasMediaAccess => bridge.has_media_access().to_string(),
            Command::MediaSessions(sessions) => {
                bridge.push_media_sessions(sessions);
                "ok".to_string()
            }
            Command::StartUpdateDownload(url) => bridge.start_update_download(&url).to_string(),
            Command::IsUpdateArtifactPresent => bridge.is_update_artifact_present().to_string(),
            Command::CheckForUpdate(current) => bridge.check_for_update(current.as_deref()),
            Command::Quit => return Reply::Quit,
        };
        Reply::Line(line)
    }
}
