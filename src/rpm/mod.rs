//! RPM querier — installed packages and their owned files
//!
//! A trait seam so the pipeline can run against a fixture-backed
//! implementation in tests. The host binding shells out to `rpm` with
//! `--root`; one subprocess per query, stdout parsed line by line.
//! A non-zero exit is a hard error for that query only.

use crate::{FipscanError, Result};
use std::path::Path;
use std::process::Command;

pub trait RpmQuerier: Send + Sync {
    /// `rpm -qa --root R`: one package per line.
    fn list_packages(&self, root: &Path) -> Result<Vec<String>>;

    /// `rpm -ql --root R PKG`: one owned file path per line.
    fn list_files(&self, root: &Path, package: &str) -> Result<Vec<String>>;
}

pub struct HostRpmQuerier;

impl HostRpmQuerier {
    fn run(&self, args: &[&str]) -> Result<Vec<String>> {
        let output = Command::new("rpm")
            .args(args)
            .output()
            .map_err(|e| FipscanError::Rpm(format!("rpm: failed to start: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FipscanError::Rpm(format!(
                "rpm {}: {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .filter(|l| !l.is_empty())
            .collect())
    }
}

impl RpmQuerier for HostRpmQuerier {
    fn list_packages(&self, root: &Path) -> Result<Vec<String>> {
        tracing::info!(root = %root.display(), "rpm -qa");
        self.run(&["-qa", "--root", &root.to_string_lossy()])
    }

    fn list_files(&self, root: &Path, package: &str) -> Result<Vec<String>> {
        tracing::debug!(package, "rpm -ql");
        self.run(&["-ql", "--root", &root.to_string_lossy(), package])
    }
}
