//! Scan pipeline — bounded parallel fan-out from roots to files
//!
//! Roots (unpacked component images or a node filesystem) are scanned
//! on a dedicated rayon pool of `Config.parallelism` threads; within a
//! root, candidate files fan out on the same pool. Workers check the
//! cancel token between items, per-file errors become results instead
//! of aborting the run, and each root's `ScanResults` is built by its
//! owning worker and moved to the caller.

pub mod cancel;
pub mod producer;

pub use cancel::CancelToken;

use crate::config::Config;
use crate::fetch::ImageFetcher;
use crate::inspect;
use crate::payload::ComponentRef;
use crate::results::{ErrorKind, ScanResult, ScanResults, Tag};
use crate::rpm::RpmQuerier;
use crate::validate;
use crate::FipscanError;
use producer::{Candidate, Produced};
use rayon::prelude::*;
use std::path::Path;

/// Directories every node scan prunes in addition to configured
/// filters.
pub const NODE_SCAN_DIR_FILTERS: &[&str] = &[
    "/lib/modules",
    "/usr/lib/firmware",
    "/usr/lib/grub",
    "/usr/lib/.build-id",
];

/// One unit of root-level work.
#[derive(Debug, Clone)]
enum RootSpec {
    Image { component: String, reference: String },
    Node { root: std::path::PathBuf },
}

pub struct ScanPipeline<'a> {
    config: &'a Config,
    fetcher: &'a dyn ImageFetcher,
    rpm: &'a dyn RpmQuerier,
}

impl<'a> ScanPipeline<'a> {
    pub fn new(
        config: &'a Config,
        fetcher: &'a dyn ImageFetcher,
        rpm: &'a dyn RpmQuerier,
    ) -> Self {
        Self {
            config,
            fetcher,
            rpm,
        }
    }

    /// Scan every selected component image of a release payload.
    pub fn run_payload(
        &self,
        references: Vec<ComponentRef>,
        token: &CancelToken,
    ) -> Vec<ScanResults> {
        let mut roots: Vec<RootSpec> = references
            .into_iter()
            .filter(|r| self.config.component_selected(&r.name))
            .filter(|r| !self.config.image_filtered(&r.image))
            .map(|r| RootSpec::Image {
                component: r.name,
                reference: r.image,
            })
            .collect();
        if self.config.limit >= 0 {
            roots.truncate(self.config.limit as usize);
        }
        tracing::info!(roots = roots.len(), "payload scan");
        self.scan_roots(roots, token)
    }

    /// Scan a single image reference.
    pub fn run_image(
        &self,
        component: &str,
        reference: &str,
        token: &CancelToken,
    ) -> Vec<ScanResults> {
        let roots = vec![RootSpec::Image {
            component: component.to_string(),
            reference: reference.to_string(),
        }];
        self.scan_roots(roots, token)
    }

    /// Scan a mounted node filesystem.
    pub fn run_node(&self, root: &Path, token: &CancelToken) -> Vec<ScanResults> {
        let roots = vec![RootSpec::Node {
            root: root.to_path_buf(),
        }];
        self.scan_roots(roots, token)
    }

    /// Scan one binary under a top directory, outside any pipeline.
    pub fn scan_file(&self, topdir: &Path, innerpath: &Path) -> ScanResult {
        let tag = Tag::new("binary", topdir.to_string_lossy());
        let rel = innerpath.strip_prefix("/").unwrap_or(innerpath);
        let disk_path = topdir.join(rel);
        let inspection =
            inspect::classify_and_inspect(&disk_path, &self.config.rules, self.config.java);
        validate::validate(innerpath, &tag, None, &inspection, &self.config.rules)
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn scan_roots(&self, roots: Vec<RootSpec>, token: &CancelToken) -> Vec<ScanResults> {
        if roots.is_empty() {
            return Vec::new();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.parallelism)
            .build();
        let pool = match pool {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!(error = %e, "worker pool construction failed");
                return roots
                    .iter()
                    .map(|spec| self.internal_error_results(spec, &e.to_string()))
                    .collect();
            }
        };
        pool.install(|| {
            roots
                .par_iter()
                .map(|spec| self.scan_root(spec, &token.child()))
                .collect()
        })
    }

    fn scan_root(&self, spec: &RootSpec, token: &CancelToken) -> ScanResults {
        let (component, tag) = match spec {
            RootSpec::Image {
                component,
                reference,
            } => (component.clone(), Tag::new(component, reference)),
            RootSpec::Node { root } => ("node".to_string(), Tag::node(root.to_string_lossy())),
        };
        let mut results = ScanResults::new(&component);

        if token.is_cancelled() {
            results.append(self.interruption_result(&tag, token, "root not scanned"));
            return results;
        }

        // Fetch/unpack failures yield one synthetic root-level result
        // and skip the root.
        let root = match spec {
            RootSpec::Image { reference, .. } => match self.fetcher.fetch(reference) {
                Ok(root) => root,
                Err(e) => {
                    let kind = match &e {
                        FipscanError::Unpack(_) => ErrorKind::UnpackFailed,
                        _ => ErrorKind::FetchFailed,
                    };
                    tracing::error!(image = reference, error = %e, "root unavailable");
                    let failure = ScanResult::failure("", tag.clone(), kind, e.to_string());
                    results.append(validate::apply_exceptions(failure, &self.config.rules));
                    return results;
                }
            },
            RootSpec::Node { root } => crate::fetch::UnpackedRoot::existing(root.clone()),
        };

        let Produced { candidates, errors } = if self.config.use_rpm_scan {
            producer::rpm_candidates(&root.dir, &tag, self.config, self.rpm, token)
        } else {
            producer::walk_candidates(&root.dir, self.config, token)
        };
        for error in errors {
            results.append(validate::apply_exceptions(error, &self.config.rules));
        }

        tracing::info!(
            component = %component,
            candidates = candidates.len(),
            "scanning root"
        );
        let total = candidates.len();
        let scanned: Vec<ScanResult> = candidates
            .par_iter()
            .filter_map(|candidate| {
                if token.is_cancelled() {
                    return None;
                }
                Some(self.scan_candidate(candidate, &tag))
            })
            .collect();
        let complete = scanned.len() == total;
        results.extend(scanned);

        if !complete {
            results.append(self.interruption_result(&tag, token, "root partially scanned"));
        }
        // `root` drops here: the unpacked tree is cleaned up only after
        // this root's results are closed.
        results
    }

    fn scan_candidate(&self, candidate: &Candidate, tag: &Tag) -> ScanResult {
        let inspection = inspect::classify_and_inspect(
            &candidate.disk_path,
            &self.config.rules,
            self.config.java,
        );
        let result = validate::validate(
            &candidate.inner_path,
            tag,
            candidate.rpm.as_deref(),
            &inspection,
            &self.config.rules,
        );
        if !result.is_success() {
            tracing::debug!(
                path = %result.path.display(),
                status = %result.status,
                "scanned"
            );
        }
        result
    }

    fn interruption_result(&self, tag: &Tag, token: &CancelToken, detail: &str) -> ScanResult {
        let kind = if token.deadline_exceeded() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Cancelled
        };
        validate::apply_exceptions(
            ScanResult::failure("", tag.clone(), kind, detail),
            &self.config.rules,
        )
    }

    fn internal_error_results(&self, spec: &RootSpec, detail: &str) -> ScanResults {
        let (component, tag) = match spec {
            RootSpec::Image {
                component,
                reference,
            } => (component.clone(), Tag::new(component, reference)),
            RootSpec::Node { root } => ("node".to_string(), Tag::node(root.to_string_lossy())),
        };
        let mut results = ScanResults::new(component);
        results.append(ScanResult::failure(
            "",
            tag,
            ErrorKind::Internal,
            detail,
        ));
        results
    }
}
