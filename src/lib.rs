//! # fipscan — Cryptographic-Compliance Payload Auditor
//!
//! Audits the binary contents of container images and node filesystems
//! against a FIPS-style policy: which libraries may be linked, which
//! symbols may be present, how Go binaries must carry their crypto, and
//! which Java algorithms must stay disabled.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ScanPipeline                          │
//! │  ┌──────────┐ ┌───────────┐ ┌──────────┐ ┌───────────────┐  │
//! │  │ Payload  │ │ Image     │ │ Rpm      │ │ CancelToken   │  │
//! │  │ resolver │ │ fetcher   │ │ querier  │ │ (deadline)    │  │
//! │  └────┬─────┘ └────┬──────┘ └────┬─────┘ └──────┬────────┘  │
//! │       │            │             │              │           │
//! │  ┌────▼────────────▼─────────────▼──────────────▼────────┐  │
//! │  │  Roots → candidate files (rayon, bounded parallelism) │  │
//! │  │  Classifier → ELF / Go / Java inspectors → Validator  │  │
//! │  └───────────────────────────┬───────────────────────────┘  │
//! │                              │                              │
//! │  ┌───────────────────────────▼───────────────────────────┐  │
//! │  │  ScanResults → exception matching → Aggregator        │  │
//! │  │  → table / CSV / Markdown / HTML report               │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//!
//! - **Release payload scans**: fan out over every component image of a
//!   release manifest, bounded by `--parallelism` and `--time-limit`
//! - **Native ELF validation**: `DT_NEEDED` / `DT_RUNPATH` extraction,
//!   static-binary detection, required/forbidden library rules
//! - **Go binary validation**: buildinfo parsing, crypto symbol
//!   fingerprints, dynamic-CGO linkage rules
//! - **Java archive validation**: manifest main-class rules and
//!   `java.security` overrides that re-enable disabled algorithms
//! - **Exception engine**: declarative downgrades keyed by RPM, path
//!   glob, component, and error kind
//! - **Deterministic reports**: identical inputs render byte-identical
//!   reports regardless of worker scheduling

pub mod cli;
pub mod config;
pub mod fetch;
pub mod inspect;
pub mod payload;
pub mod report;
pub mod results;
pub mod rpm;
pub mod rules;
pub mod scan;
pub mod validate;

// Re-exports for convenience
pub use config::{Config, ConfigFile};
pub use inspect::{classify_and_inspect, Inspection};
pub use report::{render_report, write_report, ReportFormat};
pub use results::{ErrorKind, ScanResult, ScanResults, Status, Summary, Tag};
pub use rules::Rules;
pub use scan::{CancelToken, ScanPipeline};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FipscanError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing application dependency: {0}")]
    Dependency(String),

    #[error("image fetch failed: {0}")]
    Fetch(String),

    #[error("image unpack failed: {0}")]
    Unpack(String),

    #[error("rpm query failed: {0}")]
    Rpm(String),

    #[error("payload resolution failed: {0}")]
    Payload(String),

    #[error("report error: {0}")]
    Report(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, FipscanError>;
