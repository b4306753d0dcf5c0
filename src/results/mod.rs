//! Result model — typed verdicts, per-file results, and aggregation
//!
//! Every file path dispatched to the classifier produces exactly one
//! `ScanResult`. Results are append-only inside a `ScanResults` owned by
//! the worker that scanned the root, then moved to the aggregator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ─── Verdict ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Warning,
    Failure,
    Skipped,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Failure => write!(f, "failure"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

// ─── Error Taxonomy ─────────────────────────────────────────────────

/// Stable identifiers used by exception matchers. Deserializing an
/// unknown identifier is a config load error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FetchFailed,
    UnpackFailed,
    RpmQueryFailed,
    IoError,
    SymlinkCycle,
    MalformedElf,
    MissingRequiredLib,
    ForbiddenLib,
    ForbiddenSymbol,
    StaticBinary,
    GoFipsIndeterminate,
    NotDynamicCgo,
    JavaForbiddenMain,
    JavaReenabledAlgorithm,
    Cancelled,
    Timeout,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FetchFailed => "fetch_failed",
            Self::UnpackFailed => "unpack_failed",
            Self::RpmQueryFailed => "rpm_query_failed",
            Self::IoError => "io_error",
            Self::SymlinkCycle => "symlink_cycle",
            Self::MalformedElf => "malformed_elf",
            Self::MissingRequiredLib => "missing_required_lib",
            Self::ForbiddenLib => "forbidden_lib",
            Self::ForbiddenSymbol => "forbidden_symbol",
            Self::StaticBinary => "static_binary",
            Self::GoFipsIndeterminate => "go_fips_indeterminate",
            Self::NotDynamicCgo => "not_dynamic_cgo",
            Self::JavaForbiddenMain => "java_forbidden_main",
            Self::JavaReenabledAlgorithm => "java_reenabled_algorithm",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

impl ErrorKind {
    /// Kinds that record interruption rather than a rule violation.
    pub fn is_interruption(self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout)
    }
}

// ─── Origin Tag ─────────────────────────────────────────────────────

/// Origin label attached to every result: which component and which
/// image reference (or node root) the file came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub component: String,
    pub image: String,
}

impl Tag {
    pub fn new(component: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            image: image.into(),
        }
    }

    /// Tag for a node scan, where there is no image reference.
    pub fn node(root: impl Into<String>) -> Self {
        Self {
            component: "node".into(),
            image: root.into(),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.image.is_empty() {
            write!(f, "{}", self.component)
        } else {
            write!(f, "{}[{}]", self.component, self.image)
        }
    }
}

// ─── Per-file Result ────────────────────────────────────────────────

/// One verdict for one inspected path (or one synthetic root-level
/// event such as a fetch failure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Absolute path inside the scanned root. Empty for root-level events.
    pub path: PathBuf,
    pub tag: Tag,
    /// Owning package, when discovered through the RPM database.
    pub rpm: Option<String>,
    pub status: Status,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
    /// Violating symbols, unexpected library names, re-enabled algorithms.
    pub evidence: Vec<String>,
    /// Description of the exception predicate that downgraded this
    /// result, when one matched.
    pub suppressed_by: Option<String>,
}

impl ScanResult {
    pub fn success(path: impl Into<PathBuf>, tag: Tag) -> Self {
        Self {
            path: path.into(),
            tag,
            rpm: None,
            status: Status::Success,
            error_kind: None,
            error_detail: None,
            evidence: Vec::new(),
            suppressed_by: None,
        }
    }

    pub fn skipped(path: impl Into<PathBuf>, tag: Tag, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tag,
            rpm: None,
            status: Status::Skipped,
            error_kind: None,
            error_detail: Some(detail.into()),
            evidence: Vec::new(),
            suppressed_by: None,
        }
    }

    pub fn failure(
        path: impl Into<PathBuf>,
        tag: Tag,
        kind: ErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            tag,
            rpm: None,
            status: Status::Failure,
            error_kind: Some(kind),
            error_detail: Some(detail.into()),
            evidence: Vec::new(),
            suppressed_by: None,
        }
    }

    pub fn warning(
        path: impl Into<PathBuf>,
        tag: Tag,
        kind: ErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status: Status::Warning,
            ..Self::failure(path, tag, kind, detail)
        }
    }

    pub fn with_rpm(mut self, rpm: Option<String>) -> Self {
        self.rpm = rpm;
        self
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

// ─── Per-root Collection ────────────────────────────────────────────

/// Append-only collection of results for one root. Discovery order is
/// preserved; the aggregator imposes the deterministic sort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResults {
    pub component: String,
    pub items: Vec<ScanResult>,
}

impl ScanResults {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            items: Vec::new(),
        }
    }

    pub fn append(&mut self, result: ScanResult) {
        self.items.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = ScanResult>) {
        self.items.extend(results);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ─── Aggregation ────────────────────────────────────────────────────

/// Whether any failure survived exception matching.
pub fn is_failed(runs: &[ScanResults]) -> bool {
    runs.iter()
        .flat_map(|r| &r.items)
        .any(|r| r.status == Status::Failure)
}

/// Whether any warning survived exception matching.
pub fn is_warnings(runs: &[ScanResults]) -> bool {
    runs.iter()
        .flat_map(|r| &r.items)
        .any(|r| r.status == Status::Warning)
}

/// Counts per status, bucketed component → image.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub success: usize,
    pub warning: usize,
    pub failure: usize,
    pub skipped: usize,
    /// (component, image) → per-status counts, in sort order.
    pub buckets: BTreeMap<(String, String), StatusCounts>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusCounts {
    pub success: usize,
    pub warning: usize,
    pub failure: usize,
    pub skipped: usize,
}

impl StatusCounts {
    fn bump(&mut self, status: Status) {
        match status {
            Status::Success => self.success += 1,
            Status::Warning => self.warning += 1,
            Status::Failure => self.failure += 1,
            Status::Skipped => self.skipped += 1,
        }
    }
}

impl Summary {
    pub fn from_runs(runs: &[ScanResults]) -> Self {
        let mut summary = Self::default();
        for result in runs.iter().flat_map(|r| &r.items) {
            match result.status {
                Status::Success => summary.success += 1,
                Status::Warning => summary.warning += 1,
                Status::Failure => summary.failure += 1,
                Status::Skipped => summary.skipped += 1,
            }
            summary
                .buckets
                .entry((result.tag.component.clone(), result.tag.image.clone()))
                .or_default()
                .bump(result.status);
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.success + self.warning + self.failure + self.skipped
    }
}

/// All results in the deterministic report order: (component, image,
/// path), first-seen order preserved for duplicates via stable sort.
pub fn sorted_results(runs: &[ScanResults]) -> Vec<&ScanResult> {
    let mut all: Vec<&ScanResult> = runs.iter().flat_map(|r| &r.items).collect();
    all.sort_by(|a, b| {
        (&a.tag.component, &a.tag.image, &a.path).cmp(&(&b.tag.component, &b.tag.image, &b.path))
    });
    all
}
