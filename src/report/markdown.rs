//! Markdown renderer for CI summaries

use super::{summary_line, Row};
use crate::results::Summary;

pub(super) fn render(rows: &[Row], summary: &Summary) -> String {
    let mut md = String::with_capacity(4096);
    md.push_str("# Crypto Compliance Scan\n\n");

    md.push_str("## Summary\n\n");
    md.push_str(&format!("{}\n\n", summary_line(summary)));

    md.push_str("| Component | Image | Status counts |\n|---|---|---|\n");
    for ((component, image), counts) in &summary.buckets {
        md.push_str(&format!(
            "| {} | `{}` | {} success / {} warning / {} failure / {} skipped |\n",
            component, image, counts.success, counts.warning, counts.failure, counts.skipped
        ));
    }
    md.push('\n');

    md.push_str("## Results\n\n");
    md.push_str("| Status | Component | Path | RPM | Error | Detail |\n");
    md.push_str("|--------|-----------|------|-----|-------|--------|\n");
    for row in rows {
        md.push_str(&format!(
            "| {} | {} | `{}` | {} | {} | {} |\n",
            row.status,
            row.component,
            row.path,
            row.rpm,
            row.error_kind,
            escape(row.detail),
        ));
    }
    md.push('\n');
    md
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}
