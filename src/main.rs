//! fipscan binary — subcommand dispatch, exit-code mapping, profiling
//!
//! Exit codes: 0 all success or only skipped; 1 surviving failures (or
//! surviving warnings with `--fail-on-warnings`); 2 usage errors
//! (clap); 3 invalid configuration.

use clap::Parser;
use fipscan::cli::{Cli, Commands, ScanOpts, ScanTarget};
use fipscan::config::{Config, ConfigFile, Settings};
use fipscan::fetch::{ensure_tools, PodmanFetcher};
use fipscan::rpm::HostRpmQuerier;
use fipscan::scan::{CancelToken, ScanPipeline, NODE_SCAN_DIR_FILTERS};
use fipscan::{report, results, FipscanError};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_FAILURES: u8 = 1;
const EXIT_BAD_CONFIG: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("{}", build_revision());
            ExitCode::SUCCESS
        }
        Commands::Scan { opts, target } => match run_scan(opts, target, cli.verbose) {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "scan aborted");
                eprintln!("error: {e}");
                match e {
                    FipscanError::Config(_) | FipscanError::Toml(_) => {
                        ExitCode::from(EXIT_BAD_CONFIG)
                    }
                    _ => ExitCode::from(EXIT_FAILURES),
                }
            }
        },
    }
}

fn build_revision() -> &'static str {
    option_env!("FIPSCAN_COMMIT").unwrap_or(env!("CARGO_PKG_VERSION"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_scan(
    opts: ScanOpts,
    target: ScanTarget,
    verbose: bool,
) -> fipscan::Result<ExitCode> {
    let config = build_config(&opts, &target, verbose)?;
    config.log();
    tracing::info!(version = build_revision(), "scan");
    preflight(&config, &target)?;

    let profiler = Profiler::start(opts.cpuprofile.as_deref());

    let token = CancelToken::with_timeout(config.time_limit);
    let fetcher = PodmanFetcher::new(config.pull_secret.clone(), config.insecure_pull);
    let querier = HostRpmQuerier;
    let pipeline = ScanPipeline::new(&config, &fetcher, &querier);

    let runs = match &target {
        ScanTarget::Payload { url, file, .. } => {
            let references = match (url, file) {
                (Some(url), _) => fipscan::payload::from_url(url)?,
                (_, Some(file)) => fipscan::payload::from_file(file)?,
                _ => unreachable!("clap enforces url xor file"),
            };
            pipeline.run_payload(references, &token)
        }
        ScanTarget::Image { spec, .. } | ScanTarget::JavaImage { spec, .. } => {
            pipeline.run_image(component_of(spec), spec, &token)
        }
        ScanTarget::Node { root, .. } => pipeline.run_node(root, &token),
        ScanTarget::Binary { topdir, innerpath } => {
            let result = pipeline.scan_file(topdir, innerpath);
            let mut results = results::ScanResults::new("binary");
            results.append(result);
            vec![results]
        }
    };

    report::write_report(&runs, config.output_format, config.output_file.as_deref())?;
    if config.print_exceptions {
        print!("{}", report::render_exceptions(&runs));
    }

    profiler.write();

    let failed = results::is_failed(&runs);
    let warned = results::is_warnings(&runs);
    if failed || (warned && config.fail_on_warnings) {
        Ok(ExitCode::from(EXIT_FAILURES))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn build_config(
    opts: &ScanOpts,
    target: &ScanTarget,
    verbose: bool,
) -> fipscan::Result<Config> {
    let mut file = ConfigFile::load(opts.config.as_deref())?;
    if let Some(version) = &opts.config_for_version {
        file.add_version_overlay(version)?;
    }
    if let ScanTarget::JavaImage {
        disabled_algorithms,
        ..
    } = target
    {
        file.java
            .disabled_algorithms
            .extend(disabled_algorithms.iter().cloned());
    }

    let mut filter_dirs = opts.filter_dirs.clone();
    if matches!(target, ScanTarget::Node { .. }) {
        filter_dirs.extend(NODE_SCAN_DIR_FILTERS.iter().map(|d| d.to_string()));
    }

    let settings = Settings {
        components: opts.components.clone(),
        filter_files: opts.filter_files.clone(),
        filter_dirs,
        filter_images: opts.filter_images.clone(),
        parallelism: opts.parallelism,
        time_limit: opts.time_limit,
        limit: opts.limit,
        fail_on_warnings: opts.fail_on_warnings,
        insecure_pull: opts.insecure_pull,
        pull_secret: opts.pull_secret.clone(),
        output_file: opts.output_file.clone(),
        output_format: opts.output_format,
        print_exceptions: opts.print_exceptions,
        verbose,
    };

    let mut config = Config::build(file, settings)?;
    config.use_rpm_scan = match target {
        ScanTarget::Payload { rpm_scan, .. }
        | ScanTarget::Image { rpm_scan, .. }
        | ScanTarget::JavaImage { rpm_scan, .. } => *rpm_scan,
        ScanTarget::Node { walk_scan, .. } => !*walk_scan,
        ScanTarget::Binary { .. } => false,
    };
    config.java = matches!(target, ScanTarget::JavaImage { .. });
    Ok(config)
}

/// Verify external tools before any work starts.
fn preflight(config: &Config, target: &ScanTarget) -> fipscan::Result<()> {
    let mut tools: Vec<&str> = match target {
        ScanTarget::Payload { .. } => vec!["podman", "oc"],
        ScanTarget::Image { .. } | ScanTarget::JavaImage { .. } => vec!["podman"],
        ScanTarget::Node { .. } | ScanTarget::Binary { .. } => vec![],
    };
    if config.use_rpm_scan {
        tools.push("rpm");
    }
    ensure_tools(&tools)
}

fn component_of(spec: &str) -> &str {
    // quay.io/openshift/etcd@sha256:... -> etcd
    let tail = spec.rsplit('/').next().unwrap_or(spec);
    tail.split(['@', ':']).next().unwrap_or(tail)
}

// ─── CPU profiling ──────────────────────────────────────────────────

struct Profiler {
    #[cfg(unix)]
    guard: Option<(pprof::ProfilerGuard<'static>, std::path::PathBuf)>,
}

impl Profiler {
    fn start(path: Option<&Path>) -> Self {
        #[cfg(unix)]
        {
            let guard = path.and_then(|p| match pprof::ProfilerGuard::new(99) {
                Ok(guard) => {
                    tracing::info!(profile = %p.display(), "collecting CPU profile data");
                    Some((guard, p.to_path_buf()))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "CPU profiler unavailable");
                    None
                }
            });
            Self { guard }
        }
        #[cfg(not(unix))]
        {
            if path.is_some() {
                tracing::warn!("CPU profiling is only supported on unix");
            }
            Self {}
        }
    }

    fn write(self) {
        #[cfg(unix)]
        if let Some((guard, path)) = self.guard {
            let written = guard
                .report()
                .build()
                .map_err(|e| e.to_string())
                .and_then(|report| {
                    std::fs::File::create(&path)
                        .map_err(|e| e.to_string())
                        .and_then(|file| {
                            report.flamegraph(file).map_err(|e| e.to_string())
                        })
                });
            match written {
                Ok(()) => tracing::info!(profile = %path.display(), "CPU profile saved"),
                Err(e) => tracing::warn!(error = %e, "CPU profile not written"),
            }
        }
    }
}
