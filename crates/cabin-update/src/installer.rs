//! Install handoff
//!
//! Installation is OS-mediated and fire-and-forget: the bridge starts it
//! and never learns the outcome.

use std::path::Path;
use std::process::Stdio;

use tracing::{info, warn};

use crate::error::UpdateError;

pub trait Installer: Send + Sync {
    /// Whether the bridge may start an install right now
    fn can_install(&self) -> bool;

    /// Send the user to wherever the install grant is given
    fn request_permission(&self);

    fn install(&self, artifact: &Path) -> Result<(), UpdateError>;
}

/// Runs a configured command with the artifact path appended
///
/// Must be used from within a tokio runtime; the child is awaited on a
/// background task only to log its exit status.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    argv: Vec<String>,
}

impl CommandInstaller {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Installer for CommandInstaller {
    fn can_install(&self) -> bool {
        !self.argv.is_empty()
    }

    fn request_permission(&self) {
        warn!("No install command configured; set update.install_command to enable installs");
    }

    fn install(&self, artifact: &Path) -> Result<(), UpdateError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| UpdateError::Install("no install command configured".into()))?;

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .arg(artifact)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| UpdateError::Install(format!("{}: {}", program, e)))?;

        info!(program = %program, artifact = %artifact.display(), "Install started");

        let program = program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => info!(program = %program, "Installer exited"),
                Ok(status) => warn!(program = %program, %status, "Installer failed"),
                Err(e) => warn!(program = %program, error = %e, "Failed to wait for installer"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_cannot_install() {
        let installer = CommandInstaller::new(vec![]);
        assert!(!installer.can_install());
        assert!(matches!(
            installer.install(Path::new("/tmp/x")),
            Err(UpdateError::Install(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_receives_artifact_path() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("installed");
        let script = format!("cp \"$0\" {}", marker.display());
        let artifact = dir.path().join("cabin-latest.pkg");
        std::fs::write(&artifact, b"payload").unwrap();

        let installer = CommandInstaller::new(vec!["sh".into(), "-c".into(), script]);
        installer.install(&artifact).unwrap();

        for _ in 0..200 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(std::fs::read(&marker).unwrap(), b"payload");
    }
}
