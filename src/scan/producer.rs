//! Candidate producers — RPM file-lists or a directory walk
//!
//! One producer runs per root. Both modes dedupe by absolute path and
//! honor the file and directory filters before a candidate is emitted,
//! so filtered paths never reach the classifier.

use crate::config::Config;
use crate::results::{ErrorKind, ScanResult, Tag};
use crate::rpm::RpmQuerier;
use crate::scan::CancelToken;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One unit of work: an absolute on-disk path, its in-root path for
/// reporting, and the owning package when known.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub disk_path: PathBuf,
    pub inner_path: PathBuf,
    pub rpm: Option<String>,
}

/// Producer output: candidates in discovery order plus the results of
/// producer-stage errors (failed RPM queries).
#[derive(Debug, Default)]
pub struct Produced {
    pub candidates: Vec<Candidate>,
    pub errors: Vec<ScanResult>,
}

fn path_filtered(config: &Config, inner: &Path) -> bool {
    let inner_str = inner.to_string_lossy();
    if config.filter_files.contains(inner_str.as_ref()) {
        return true;
    }
    inner
        .ancestors()
        .skip(1)
        .any(|dir| config.filter_dirs.contains(dir.to_string_lossy().as_ref()))
}

// ─── RPM mode ───────────────────────────────────────────────────────

/// Enumerate installed packages and their owned files. A failing
/// query isolates to one `rpm_query_failed` result; the scan goes on.
pub fn rpm_candidates(
    root: &Path,
    tag: &Tag,
    config: &Config,
    querier: &dyn RpmQuerier,
    token: &CancelToken,
) -> Produced {
    let mut produced = Produced::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    let packages = match querier.list_packages(root) {
        Ok(packages) => packages,
        Err(e) => {
            produced.errors.push(ScanResult::failure(
                "",
                tag.clone(),
                ErrorKind::RpmQueryFailed,
                e.to_string(),
            ));
            return produced;
        }
    };
    tracing::info!(root = %root.display(), packages = packages.len(), "rpm scan");

    for package in packages {
        if token.is_cancelled() {
            break;
        }
        let files = match querier.list_files(root, &package) {
            Ok(files) => files,
            Err(e) => {
                produced.errors.push(
                    ScanResult::failure("", tag.clone(), ErrorKind::RpmQueryFailed, e.to_string())
                        .with_rpm(Some(package.clone())),
                );
                continue;
            }
        };
        for file in files {
            let inner = PathBuf::from(&file);
            if path_filtered(config, &inner) || !seen.insert(inner.clone()) {
                continue;
            }
            let disk_path = join_under_root(root, &inner);
            match std::fs::symlink_metadata(&disk_path) {
                // Symlinked entries are scanned under their target's
                // own path; stripped files are tolerated silently.
                Ok(meta) if meta.file_type().is_symlink() => continue,
                Ok(meta) if !meta.is_file() => continue,
                Err(_) => continue,
                Ok(_) => {}
            }
            produced.candidates.push(Candidate {
                disk_path,
                inner_path: inner,
                rpm: Some(package.clone()),
            });
        }
    }
    produced
}

// ─── Walk mode ──────────────────────────────────────────────────────

/// Depth-first traversal pruning filtered directories at descent time.
pub fn walk_candidates(root: &Path, config: &Config, token: &CancelToken) -> Produced {
    let mut produced = Produced::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        let inner = strip_root(root, entry.path());
        !config.filter_dirs.contains(inner.to_string_lossy().as_ref())
    });

    for entry in walker {
        if token.is_cancelled() {
            break;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "walk error");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let inner = strip_root(root, entry.path());
        if path_filtered(config, &inner) || !seen.insert(inner.clone()) {
            continue;
        }
        produced.candidates.push(Candidate {
            disk_path: entry.path().to_path_buf(),
            inner_path: inner,
            rpm: None,
        });
    }
    produced
}

fn strip_root(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(|rel| Path::new("/").join(rel))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn join_under_root(root: &Path, inner: &Path) -> PathBuf {
    let rel = inner.strip_prefix("/").unwrap_or(inner);
    root.join(rel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, Settings};

    fn config_with_filters(files: &[&str], dirs: &[&str]) -> Config {
        let settings = Settings {
            filter_files: files.iter().map(|s| s.to_string()).collect(),
            filter_dirs: dirs.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Config::build(ConfigFile::default(), settings).unwrap()
    }

    #[test]
    fn test_walk_respects_filters_and_dedupes() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
        std::fs::create_dir_all(dir.path().join("usr/src")).unwrap();
        std::fs::write(dir.path().join("usr/bin/tool"), b"x").unwrap();
        std::fs::write(dir.path().join("usr/bin/skipme"), b"x").unwrap();
        std::fs::write(dir.path().join("usr/src/kernel.c"), b"x").unwrap();

        let config = config_with_filters(&["/usr/bin/skipme"], &["/usr/src"]);
        let produced = walk_candidates(dir.path(), &config, &CancelToken::unbounded());

        let inner: Vec<String> = produced
            .candidates
            .iter()
            .map(|c| c.inner_path.display().to_string())
            .collect();
        assert_eq!(inner, vec!["/usr/bin/tool"]);
        assert!(produced.errors.is_empty());
    }

    #[test]
    fn test_walk_stops_on_cancel() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a"), b"x").unwrap();
        let token = CancelToken::unbounded();
        token.cancel();
        let produced = walk_candidates(dir.path(), &config_with_filters(&[], &[]), &token);
        assert!(produced.candidates.is_empty());
    }
}
