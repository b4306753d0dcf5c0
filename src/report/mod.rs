//! Report generation — table, CSV, Markdown, and HTML output
//!
//! Renders the aggregated result set for terminals, spreadsheets, and
//! CI summaries. Rows are emitted in the deterministic (component,
//! image, path) order so identical inputs produce identical reports.

mod csv;
mod html;
mod markdown;
mod table;

use crate::results::{sorted_results, ScanResult, ScanResults, Summary};
use crate::{FipscanError, Result};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Table,
    Csv,
    Markdown,
    Html,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Csv => write!(f, "csv"),
            Self::Markdown => write!(f, "markdown"),
            Self::Html => write!(f, "html"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => Err(format!(
                "unknown output format {other:?} (expected table, csv, markdown, or html)"
            )),
        }
    }
}

/// One rendered line of the report.
pub(crate) struct Row<'a> {
    pub component: &'a str,
    pub image: &'a str,
    pub path: String,
    pub rpm: &'a str,
    pub status: String,
    pub error_kind: String,
    pub detail: &'a str,
}

impl<'a> Row<'a> {
    fn from_result(result: &'a ScanResult) -> Self {
        Self {
            component: &result.tag.component,
            image: &result.tag.image,
            path: result.path.display().to_string(),
            rpm: result.rpm.as_deref().unwrap_or(""),
            status: result.status.to_string(),
            error_kind: result
                .error_kind
                .map(|k| k.to_string())
                .unwrap_or_default(),
            detail: result.error_detail.as_deref().unwrap_or(""),
        }
    }
}

/// Render the aggregate in the requested format.
pub fn render_report(runs: &[ScanResults], format: ReportFormat) -> String {
    let results = sorted_results(runs);
    let rows: Vec<Row> = results.iter().map(|r| Row::from_result(r)).collect();
    let summary = Summary::from_runs(runs);
    match format {
        ReportFormat::Table => table::render(&rows, &summary),
        ReportFormat::Csv => csv::render(&rows),
        ReportFormat::Markdown => markdown::render(&rows, &summary),
        ReportFormat::Html => html::render(&rows, &summary),
    }
}

/// Results suppressed by exceptions, with the predicate that matched.
pub fn render_exceptions(runs: &[ScanResults]) -> String {
    let mut out = String::from("suppressed results:\n");
    let mut any = false;
    for result in sorted_results(runs) {
        if let Some(predicate) = &result.suppressed_by {
            any = true;
            out.push_str(&format!(
                "  {} {} {} <- {}\n",
                result.tag,
                result.path.display(),
                result.status,
                predicate
            ));
        }
    }
    if !any {
        out.push_str("  (none)\n");
    }
    out
}

/// Write to the sink: a file when configured, stdout otherwise.
/// Unrecoverable sink I/O aborts the run.
pub fn write_report(
    runs: &[ScanResults],
    format: ReportFormat,
    output_file: Option<&std::path::Path>,
) -> Result<()> {
    let content = render_report(runs, format);
    match output_file {
        Some(path) => std::fs::write(path, content)
            .map_err(|e| FipscanError::Report(format!("can't write {}: {e}", path.display()))),
        None => {
            print!("{content}");
            Ok(())
        }
    }
}

pub(crate) fn summary_line(summary: &Summary) -> String {
    format!(
        "{} scanned: {} success, {} warnings, {} failures, {} skipped",
        summary.total(),
        summary.success,
        summary.warning,
        summary.failure,
        summary.skipped
    )
}
