//! Rule model and exception matchers
//!
//! The declarative policy the validator evaluates: required/forbidden
//! libraries and symbols, Go FIPS fingerprints, Java disabled
//! algorithms, plus the exception predicates that downgrade results.
//!
//! Predicates are evaluated in declaration order; the first match wins.
//! A path predicate is either a literal prefix or a glob (`*` matches
//! within one path segment, `**` across segments). Missing fields are
//! wildcards.

use crate::results::ErrorKind;
use crate::{FipscanError, Result};
use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

// ─── Raw (serde) rule entries ───────────────────────────────────────

/// One exception predicate over scan errors. Matching downgrades the
/// result to skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrIgnore {
    pub error: ErrorKind,
    pub path: Option<String>,
    pub rpm: Option<String>,
}

/// One per-component exception predicate. Matching downgrades a
/// failure to warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayloadIgnore {
    pub component: String,
    pub prefix: Option<String>,
    pub tag: Option<String>,
}

// ─── Path predicate ─────────────────────────────────────────────────

/// Literal prefix or compiled glob over absolute in-root paths.
#[derive(Debug, Clone)]
enum PathPred {
    Prefix(String),
    Glob(GlobMatcher),
}

impl PathPred {
    fn compile(pattern: &str) -> Result<Self> {
        if pattern.contains(['*', '?', '[']) {
            // `*` stays within one path segment; `**` crosses them.
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| FipscanError::Config(format!("bad path glob {pattern:?}: {e}")))?;
            Ok(Self::Glob(glob.compile_matcher()))
        } else {
            Ok(Self::Prefix(pattern.to_string()))
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Glob(glob) => glob.is_match(path),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledErrIgnore {
    error: ErrorKind,
    path: Option<PathPred>,
    rpm: Option<String>,
    /// Human form for `--print-exceptions` and `suppressed_by`.
    describe: String,
}

#[derive(Debug, Clone)]
struct CompiledPayloadIgnore {
    component: String,
    prefix: Option<PathPred>,
    tag: Option<String>,
    describe: String,
}

// ─── Compiled rule set ──────────────────────────────────────────────

/// The merged, compiled policy shared immutably across all workers.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    err_ignores: Vec<CompiledErrIgnore>,
    rpm_ignores: HashSet<String>,
    payload_ignores: Vec<CompiledPayloadIgnore>,
    pub java_disabled_algorithms: BTreeSet<String>,
    pub java_forbidden_main_classes: HashSet<String>,
    /// Libraries every dynamically linked native binary must pull in.
    pub required_libs: Vec<String>,
    pub forbidden_libs: HashSet<String>,
    pub forbidden_symbols: Vec<String>,
    /// Symbol fingerprints proving a Go binary carries FIPS crypto.
    pub go_fips_symbols: Vec<String>,
    /// At least one of these must appear in a crypto-linking Go
    /// binary's DT_NEEDED.
    pub go_required_dynamic_libs: Vec<String>,
    /// Content sniffs the classifier skips without inspection.
    pub ignored_mimes: HashSet<String>,
}

/// Raw inputs collected from the merged config file.
#[derive(Debug, Clone, Default)]
pub struct RuleSource {
    pub err_ignores: Vec<ErrIgnore>,
    pub rpm_ignores: Vec<String>,
    pub payload_ignores: Vec<PayloadIgnore>,
    pub java_disabled_algorithms: Vec<String>,
    pub java_forbidden_main_classes: Vec<String>,
    pub required_libs: Vec<String>,
    pub forbidden_libs: Vec<String>,
    pub forbidden_symbols: Vec<String>,
    pub go_fips_symbols: Vec<String>,
    pub go_required_dynamic_libs: Vec<String>,
    pub ignored_mimes: Vec<String>,
}

impl Rules {
    pub fn compile(source: RuleSource) -> Result<Self> {
        let err_ignores = source
            .err_ignores
            .into_iter()
            .map(|ig| {
                let describe = format!(
                    "err_ignore{{error={}, path={}, rpm={}}}",
                    ig.error,
                    ig.path.as_deref().unwrap_or("*"),
                    ig.rpm.as_deref().unwrap_or("*"),
                );
                Ok(CompiledErrIgnore {
                    error: ig.error,
                    path: ig.path.as_deref().map(PathPred::compile).transpose()?,
                    rpm: ig.rpm,
                    describe,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let payload_ignores = source
            .payload_ignores
            .into_iter()
            .map(|ig| {
                let describe = format!(
                    "payload_ignore{{component={}, prefix={}, tag={}}}",
                    ig.component,
                    ig.prefix.as_deref().unwrap_or("*"),
                    ig.tag.as_deref().unwrap_or("*"),
                );
                Ok(CompiledPayloadIgnore {
                    component: ig.component,
                    prefix: ig.prefix.as_deref().map(PathPred::compile).transpose()?,
                    tag: ig.tag,
                    describe,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            err_ignores,
            rpm_ignores: source.rpm_ignores.into_iter().collect(),
            payload_ignores,
            java_disabled_algorithms: source.java_disabled_algorithms.into_iter().collect(),
            java_forbidden_main_classes: source
                .java_forbidden_main_classes
                .into_iter()
                .collect(),
            required_libs: source.required_libs,
            forbidden_libs: source.forbidden_libs.into_iter().collect(),
            forbidden_symbols: source.forbidden_symbols,
            go_fips_symbols: source.go_fips_symbols,
            go_required_dynamic_libs: source.go_required_dynamic_libs,
            ignored_mimes: source.ignored_mimes.into_iter().collect(),
        })
    }

    /// First error-ignore predicate matching (kind, path, rpm), if any.
    pub fn match_err(&self, kind: ErrorKind, path: &str, rpm: Option<&str>) -> Option<&str> {
        self.err_ignores
            .iter()
            .find(|ig| {
                ig.error == kind
                    && ig.path.as_ref().map_or(true, |p| p.matches(path))
                    && ig.rpm.as_deref().map_or(true, |r| Some(r) == rpm)
            })
            .map(|ig| ig.describe.as_str())
    }

    /// First payload-ignore predicate matching (component, path, tag).
    pub fn match_payload(&self, component: &str, path: &str, tag: &str) -> Option<&str> {
        self.payload_ignores
            .iter()
            .find(|ig| {
                ig.component == component
                    && ig.prefix.as_ref().map_or(true, |p| p.matches(path))
                    && ig.tag.as_deref().map_or(true, |t| t == tag)
            })
            .map(|ig| ig.describe.as_str())
    }

    /// Whether files owned by this package are never reported.
    pub fn match_rpm(&self, rpm: &str) -> bool {
        self.rpm_ignores.contains(rpm)
    }

    pub fn java_disabled(&self, algorithm: &str) -> bool {
        self.java_disabled_algorithms.contains(algorithm)
    }

    pub fn mime_ignored(&self, sniff: &str) -> bool {
        self.ignored_mimes.contains(sniff)
    }
}
