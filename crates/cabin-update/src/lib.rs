//! cabin-update - Update download coordination for the cabin bridge
//!
//! Downloads an update artifact to a fixed location, reports byte progress
//! to the UI every poll interval and hands the finished artifact to the
//! installer exactly once.
//!
//! # Architecture
//!
//! ```text
//!                  start(url)
//!                      │
//!            ┌─────────┴──────────┐
//!            │ UpdateCoordinator  │  removes stale artifact, enqueues
//!            └───┬────────────┬───┘
//!      poll every│            │completion
//!       interval │            │notification
//!        ┌───────┴──┐   ┌─────┴──────┐
//!        │ poll loop│   │ listener   │
//!        └───────┬──┘   └─────┬──────┘
//!                └─────┬──────┘
//!              JobState (watch)  ── first Succeeded ──▶ Installer
//! ```

pub mod config;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod http;
pub mod installer;
pub mod mock;
pub mod release;

pub use config::UpdateConfig;
pub use coordinator::{JobHandle, JobSnapshot, JobState, StartOutcome, UpdateCoordinator};
pub use download::{
    DownloadId, DownloadProgress, DownloadRequest, DownloadStatus, DownloadSubsystem,
};
pub use error::UpdateError;
pub use http::HttpDownloader;
pub use installer::{CommandInstaller, Installer};
pub use release::{check_for_update, is_newer, parse_version, UpdateCheck};
