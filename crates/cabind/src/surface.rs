//! UI surface for the daemon
//!
//! The daemon has no embedded view of its own: callback scripts are
//! written one per line to stdout, where the process hosting the UI
//! evaluates them.

use std::io::Write;

use cabin_core::UiSurface;
use tracing::warn;

/// Writes each callback script as one stdout line
#[derive(Debug, Default)]
pub struct StdoutSurface;

impl UiSurface for StdoutSurface {
    fn evaluate(&self, script: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", script).and_then(|_| out.flush()) {
            warn!(error = %e, "Failed to write UI callback");
        }
    }
}
