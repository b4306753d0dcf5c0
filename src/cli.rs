//! Command-line surface
//!
//! `fipscan version` and `fipscan scan {payload,image,java-image,node,
//! binary}`. Subcommand parsing produces a `Config` for the pipeline;
//! there is no process-wide mutable state.

use crate::report::ReportFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "fipscan", about = "Cryptographic-compliance payload auditor", version)]
pub struct Cli {
    #[arg(long, global = true, help = "verbose logging")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the build revision
    Version,
    /// Run a scan
    Scan {
        #[command(flatten)]
        opts: ScanOpts,
        #[command(subcommand)]
        target: ScanTarget,
    },
}

#[derive(Args, Debug)]
pub struct ScanOpts {
    #[arg(long, short = 'c', value_name = "PATH", help = "use toml config file")]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        short = 'V',
        value_name = "VER",
        help = "overlay the embedded config for a release version"
    )]
    pub config_for_version: Option<String>,
    #[arg(long, value_delimiter = ',', help = "restrict to these components")]
    pub components: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pub filter_files: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pub filter_dirs: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pub filter_images: Vec<String>,
    #[arg(long, help = "exit non-zero when warnings survive")]
    pub fail_on_warnings: bool,
    #[arg(long, help = "allow pulls from registries without TLS verification")]
    pub insecure_pull: bool,
    #[arg(
        long,
        default_value_t = -1,
        allow_negative_numbers = true,
        help = "limit the number of images scanned (-1 = unlimited)"
    )]
    pub limit: i64,
    #[arg(long, default_value_t = 5, help = "how many roots to scan at once")]
    pub parallelism: usize,
    #[arg(long, value_name = "PATH", help = "write the report to a file")]
    pub output_file: Option<PathBuf>,
    #[arg(
        long,
        default_value = "table",
        value_parser = parse_format,
        help = "output format (table, csv, markdown, html)"
    )]
    pub output_format: ReportFormat,
    #[arg(long, value_name = "PATH", help = "pull secret for registry access")]
    pub pull_secret: Option<PathBuf>,
    #[arg(
        long,
        default_value = "1h",
        value_parser = parse_duration,
        help = "limit total running time (e.g. 30m, 2h)"
    )]
    pub time_limit: Duration,
    #[arg(long, value_name = "PATH", help = "write a CPU profile to a file")]
    pub cpuprofile: Option<PathBuf>,
    #[arg(long, short = 'p', help = "display the suppressed-results list")]
    pub print_exceptions: bool,
}

#[derive(Subcommand, Debug)]
pub enum ScanTarget {
    /// Scan every component image of a release payload
    Payload {
        #[arg(
            long,
            short = 'u',
            conflicts_with = "file",
            required_unless_present = "file",
            help = "release payload url"
        )]
        url: Option<String>,
        #[arg(long, short = 'f', help = "release payload from a json file")]
        file: Option<PathBuf>,
        #[arg(long, help = "discover files through the RPM database")]
        rpm_scan: bool,
    },
    /// Scan a single image
    Image {
        #[arg(long, help = "image pull spec")]
        spec: String,
        #[arg(long)]
        rpm_scan: bool,
    },
    /// Scan a Java image
    JavaImage {
        #[arg(long, help = "image pull spec")]
        spec: String,
        #[arg(long)]
        rpm_scan: bool,
        #[arg(
            long,
            value_delimiter = ',',
            help = "additional algorithms Java must keep disabled"
        )]
        disabled_algorithms: Vec<String>,
    },
    /// Scan a mounted node filesystem
    Node {
        #[arg(long, help = "root path to scan")]
        root: PathBuf,
        #[arg(long, help = "walk the directory tree instead of the RPM database")]
        walk_scan: bool,
    },
    /// Scan one binary file
    Binary {
        #[arg(long, short = 't', help = "top dir containing the binary")]
        topdir: PathBuf,
        #[arg(long, short = 'i', help = "path of the binary inside the top dir")]
        innerpath: PathBuf,
    },
}

pub fn parse_format(s: &str) -> Result<ReportFormat, String> {
    s.parse()
}

/// `90s`, `30m`, `2h`, or bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let (value, scale) = match s.as_bytes().last() {
        Some(&b's') => (&s[..s.len() - 1], 1),
        Some(&b'm') => (&s[..s.len() - 1], 60),
        Some(&b'h') => (&s[..s.len() - 1], 3600),
        _ => (s, 1),
    };
    value
        .parse::<u64>()
        .map(|v| Duration::from_secs(v * scale))
        .map_err(|_| format!("invalid duration {s:?} (expected e.g. 90s, 30m, 2h)"))
}
