//! Configuration — declarative TOML policy, merge, and validation
//!
//! A base config (explicit `--config`, a `fipscan.toml` in the working
//! directory, or the compiled-in default) is optionally overlaid with an
//! embedded per-release config selected by `--config-for-version`.
//! Unknown keys anywhere are a load error. Once `validate()` returns,
//! the `Config` is shared immutably across all workers.

pub mod embedded;

use crate::report::ReportFormat;
use crate::rules::{ErrIgnore, PayloadIgnore, RuleSource, Rules};
use crate::{FipscanError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "fipscan.toml";

// ─── Raw config file ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfigFile {
    pub components: Vec<String>,
    pub rpm_ignores: Vec<String>,
    pub filter: FilterSection,
    pub elf: ElfSection,
    pub go: GoSection,
    pub java: JavaSection,
    #[serde(rename = "err_ignore")]
    pub err_ignores: Vec<ErrIgnore>,
    #[serde(rename = "payload_ignore")]
    pub payload_ignores: Vec<PayloadIgnore>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FilterSection {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
    pub images: Vec<String>,
    pub ignored_mimes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ElfSection {
    pub required_libs: Vec<String>,
    pub forbidden_libs: Vec<String>,
    pub forbidden_symbols: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GoSection {
    pub fips_symbols: Vec<String>,
    pub required_dynamic_libs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct JavaSection {
    pub disabled_algorithms: Vec<String>,
    pub forbidden_main_classes: Vec<String>,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load the base config: an explicit path, `fipscan.toml` in the
    /// working directory, or the compiled-in default.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let text = std::fs::read_to_string(path).map_err(|e| {
                FipscanError::Config(format!("can't read config {}: {e}", path.display()))
            })?;
            tracing::info!(config = %path.display(), "using config file");
            return Self::parse(&text);
        }
        match std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(text) => {
                tracing::info!(config = DEFAULT_CONFIG_FILE, "using config file");
                Self::parse(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("using embedded config");
                Self::parse(embedded::DEFAULT_CONFIG)
            }
            Err(e) => Err(FipscanError::Config(format!(
                "can't read {DEFAULT_CONFIG_FILE}: {e}"
            ))),
        }
    }

    /// Merge an overlay on top of this config: list-valued fields
    /// concatenate, set-valued fields union through the later compile.
    pub fn add(&mut self, overlay: ConfigFile) {
        self.components.extend(overlay.components);
        self.rpm_ignores.extend(overlay.rpm_ignores);
        self.filter.files.extend(overlay.filter.files);
        self.filter.dirs.extend(overlay.filter.dirs);
        self.filter.images.extend(overlay.filter.images);
        self.filter.ignored_mimes.extend(overlay.filter.ignored_mimes);
        self.elf.required_libs.extend(overlay.elf.required_libs);
        self.elf.forbidden_libs.extend(overlay.elf.forbidden_libs);
        self.elf
            .forbidden_symbols
            .extend(overlay.elf.forbidden_symbols);
        self.go.fips_symbols.extend(overlay.go.fips_symbols);
        self.go
            .required_dynamic_libs
            .extend(overlay.go.required_dynamic_libs);
        self.java
            .disabled_algorithms
            .extend(overlay.java.disabled_algorithms);
        self.java
            .forbidden_main_classes
            .extend(overlay.java.forbidden_main_classes);
        self.err_ignores.extend(overlay.err_ignores);
        self.payload_ignores.extend(overlay.payload_ignores);
    }

    /// Apply the embedded overlay for a release version, if requested.
    pub fn add_version_overlay(&mut self, version: &str) -> Result<()> {
        let text = embedded::for_version(version).ok_or_else(|| {
            FipscanError::Config(format!("no embedded config for version {version:?}"))
        })?;
        tracing::info!(version, "adding rules from embedded config");
        self.add(Self::parse(text)?);
        Ok(())
    }

    fn into_rule_source(self) -> RuleSource {
        RuleSource {
            err_ignores: self.err_ignores,
            rpm_ignores: self.rpm_ignores,
            payload_ignores: self.payload_ignores,
            java_disabled_algorithms: self.java.disabled_algorithms,
            java_forbidden_main_classes: self.java.forbidden_main_classes,
            required_libs: self.elf.required_libs,
            forbidden_libs: self.elf.forbidden_libs,
            forbidden_symbols: self.elf.forbidden_symbols,
            go_fips_symbols: self.go.fips_symbols,
            go_required_dynamic_libs: self.go.required_dynamic_libs,
            ignored_mimes: self.filter.ignored_mimes,
        }
    }
}

// ─── Runtime config ─────────────────────────────────────────────────

/// Flag-level settings merged with the config file into a `Config`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub components: Vec<String>,
    pub filter_files: Vec<String>,
    pub filter_dirs: Vec<String>,
    pub filter_images: Vec<String>,
    pub parallelism: usize,
    pub time_limit: Duration,
    pub limit: i64,
    pub fail_on_warnings: bool,
    pub insecure_pull: bool,
    pub pull_secret: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub output_format: ReportFormat,
    pub print_exceptions: bool,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            filter_files: Vec::new(),
            filter_dirs: Vec::new(),
            filter_images: Vec::new(),
            parallelism: 5,
            time_limit: Duration::from_secs(3600),
            limit: -1,
            fail_on_warnings: false,
            insecure_pull: false,
            pull_secret: None,
            output_file: None,
            output_format: ReportFormat::Table,
            print_exceptions: false,
            verbose: false,
        }
    }
}

/// Read-only once `build()` returns; shared by every worker.
#[derive(Debug, Clone)]
pub struct Config {
    pub components: Vec<String>,
    pub filter_files: HashSet<String>,
    pub filter_dirs: HashSet<String>,
    pub filter_images: HashSet<String>,
    pub parallelism: usize,
    pub time_limit: Duration,
    pub limit: i64,
    pub fail_on_warnings: bool,
    pub insecure_pull: bool,
    pub pull_secret: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub output_format: ReportFormat,
    pub print_exceptions: bool,
    pub verbose: bool,
    /// RPM file-lists when true, directory walk otherwise.
    pub use_rpm_scan: bool,
    /// Java-image mode: archive candidates get the Java inspector.
    pub java: bool,
    pub rules: Rules,
}

impl Config {
    pub fn build(file: ConfigFile, settings: Settings) -> Result<Self> {
        let mut components = file.components.clone();
        components.extend(settings.components.iter().cloned());

        let mut filter_files: HashSet<String> = file.filter.files.iter().cloned().collect();
        filter_files.extend(settings.filter_files.iter().cloned());
        let mut filter_dirs: HashSet<String> = file.filter.dirs.iter().cloned().collect();
        filter_dirs.extend(settings.filter_dirs.iter().cloned());
        let mut filter_images: HashSet<String> = file.filter.images.iter().cloned().collect();
        filter_images.extend(settings.filter_images.iter().cloned());

        let rules = Rules::compile(file.into_rule_source())?;

        let config = Self {
            components,
            filter_files,
            filter_dirs,
            filter_images,
            parallelism: settings.parallelism,
            time_limit: settings.time_limit,
            limit: settings.limit,
            fail_on_warnings: settings.fail_on_warnings,
            insecure_pull: settings.insecure_pull,
            pull_secret: settings.pull_secret,
            output_file: settings.output_file,
            output_format: settings.output_format,
            print_exceptions: settings.print_exceptions,
            verbose: settings.verbose,
            use_rpm_scan: false,
            java: false,
            rules,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(FipscanError::Config(
                "parallelism must be a positive integer".into(),
            ));
        }
        if self.limit < -1 {
            return Err(FipscanError::Config(format!(
                "limit must be -1 (unlimited) or >= 0, got {}",
                self.limit
            )));
        }
        if self.time_limit.is_zero() {
            return Err(FipscanError::Config("time limit must be non-zero".into()));
        }
        Ok(())
    }

    /// Whether a component is selected for scanning.
    pub fn component_selected(&self, name: &str) -> bool {
        self.components.is_empty() || self.components.iter().any(|c| c == name)
    }

    pub fn image_filtered(&self, reference: &str) -> bool {
        self.filter_images.contains(reference)
    }

    /// One structured event describing the effective configuration.
    pub fn log(&self) {
        tracing::info!(
            components = ?self.components,
            filter_files = self.filter_files.len(),
            filter_dirs = self.filter_dirs.len(),
            filter_images = self.filter_images.len(),
            parallelism = self.parallelism,
            time_limit = ?self.time_limit,
            limit = self.limit,
            output_format = %self.output_format,
            rpm_scan = self.use_rpm_scan,
            java = self.java,
            "using config"
        );
    }
}
