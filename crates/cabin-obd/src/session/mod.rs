//! OBD streaming session
//!
//! Owns the transport lifecycle and the background read worker that
//! forwards framed lines to the UI surface.

mod manager;

pub use manager::{ObdSessionManager, ObdStatus};

use serde::Serialize;

/// OBD session state
///
/// `Idle → Connecting → Streaming → Idle`; a failed discovery goes
/// straight from `Connecting` back to `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Streaming,
}
