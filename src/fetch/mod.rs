//! Image fetcher — pulls a reference and unpacks it into a local root
//!
//! The podman implementation pulls, creates a stopped container,
//! exports its filesystem, and untars it into scratch space. The
//! returned root owns its `TempDir`; dropping it after the root's
//! results are closed is the deterministic cleanup.

use crate::{FipscanError, Result};
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// A locally unpacked image (or an existing node root).
#[derive(Debug)]
pub struct UnpackedRoot {
    pub dir: PathBuf,
    _scratch: Option<TempDir>,
}

impl UnpackedRoot {
    /// Wrap an already-mounted directory; nothing is cleaned up.
    pub fn existing(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _scratch: None,
        }
    }
}

pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, reference: &str) -> Result<UnpackedRoot>;
}

// ─── Podman implementation ──────────────────────────────────────────

pub struct PodmanFetcher {
    pull_secret: Option<PathBuf>,
    insecure: bool,
}

impl PodmanFetcher {
    pub fn new(pull_secret: Option<PathBuf>, insecure: bool) -> Self {
        Self {
            pull_secret,
            insecure,
        }
    }
}

impl ImageFetcher for PodmanFetcher {
    fn fetch(&self, reference: &str) -> Result<UnpackedRoot> {
        let scratch = TempDir::new()?;
        let rootfs = scratch.path().join("rootfs");
        std::fs::create_dir_all(&rootfs)?;

        let mut pull = Command::new("podman");
        pull.args(["pull", "--quiet"]);
        if let Some(secret) = &self.pull_secret {
            pull.arg("--authfile").arg(secret);
        }
        if self.insecure {
            pull.arg("--tls-verify=false");
        }
        pull.arg(reference);
        run_captured(pull, "podman pull").map_err(FipscanError::Fetch)?;

        let create = {
            let mut cmd = Command::new("podman");
            cmd.args(["create", reference]);
            cmd
        };
        let container = run_captured(create, "podman create").map_err(FipscanError::Fetch)?;
        let container = container.trim().to_string();

        let tar_path = scratch.path().join("image.tar");
        let export = {
            let mut cmd = Command::new("podman");
            cmd.arg("export").arg("-o").arg(&tar_path).arg(&container);
            cmd
        };
        let exported = run_captured(export, "podman export");

        let rm = {
            let mut cmd = Command::new("podman");
            cmd.args(["rm", "-f"]).arg(&container);
            cmd
        };
        if let Err(e) = run_captured(rm, "podman rm") {
            tracing::warn!(container = %container, error = %e, "container cleanup failed");
        }
        exported.map_err(FipscanError::Unpack)?;

        let untar = {
            let mut cmd = Command::new("tar");
            cmd.arg("-xf").arg(&tar_path).arg("-C").arg(&rootfs);
            cmd
        };
        run_captured(untar, "tar").map_err(FipscanError::Unpack)?;
        if let Err(e) = std::fs::remove_file(&tar_path) {
            tracing::debug!(error = %e, "leaving export tarball behind");
        }

        tracing::info!(reference, root = %rootfs.display(), "image unpacked");
        Ok(UnpackedRoot {
            dir: rootfs,
            _scratch: Some(scratch),
        })
    }
}

/// Run a subprocess with captured stdio; non-zero exit surfaces a
/// truncated stderr excerpt.
pub fn run_captured(mut cmd: Command, name: &str) -> std::result::Result<String, String> {
    let output = cmd
        .output()
        .map_err(|e| format!("{name}: failed to start: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let excerpt: String = stderr.chars().take(512).collect();
        return Err(format!("{name}: {}: {excerpt}", output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Verify the external tools a subcommand needs are reachable before
/// any work starts.
pub fn ensure_tools(tools: &[&str]) -> Result<()> {
    for tool in tools {
        let found = Command::new(tool)
            .arg("--version")
            .output()
            .is_ok();
        if !found {
            return Err(FipscanError::Dependency(format!(
                "{tool} is not available on PATH"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_root_has_no_scratch() {
        let root = UnpackedRoot::existing("/mnt/node");
        assert_eq!(root.dir, PathBuf::from("/mnt/node"));
    }

    #[test]
    fn test_run_captured_reports_nonzero_exit() {
        let mut cmd = Command::new("false");
        cmd.arg("anything");
        assert!(run_captured(cmd, "false").is_err());
    }

    #[test]
    fn test_run_captured_returns_stdout() {
        let mut cmd = Command::new("echo");
        cmd.arg("container-id");
        let out = run_captured(cmd, "echo").unwrap();
        assert_eq!(out.trim(), "container-id");
    }

    #[test]
    fn test_ensure_tools_missing_tool() {
        assert!(ensure_tools(&["definitely-not-a-real-tool-9f3a"]).is_err());
    }
}
