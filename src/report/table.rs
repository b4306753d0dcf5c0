//! Plain-text table renderer for terminals

use super::{summary_line, Row};
use crate::results::Summary;

const HEADERS: [&str; 6] = ["STATUS", "COMPONENT", "PATH", "RPM", "ERROR", "DETAIL"];

pub(super) fn render(rows: &[Row], summary: &Summary) -> String {
    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.len()).collect();
    for row in rows {
        let cells = cells_of(row);
        for (width, cell) in widths.iter_mut().zip(cells.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::with_capacity(4096);
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    push_row(
        &mut out,
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .try_into()
            .expect("six columns"),
        &widths,
    );
    for row in rows {
        push_row(&mut out, &cells_of(row), &widths);
    }
    out.push('\n');
    out.push_str(&summary_line(summary));
    out.push('\n');
    out
}

fn cells_of(row: &Row) -> [String; 6] {
    [
        row.status.clone(),
        row.component.to_string(),
        row.path.clone(),
        row.rpm.to_string(),
        row.error_kind.clone(),
        row.detail.to_string(),
    ]
}

fn push_row(out: &mut String, cells: &[String; 6], widths: &[usize]) {
    for (i, (cell, width)) in cells.iter().zip(widths.iter()).enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        out.push_str(cell);
        // The last column carries no trailing padding.
        if i < cells.len() - 1 {
            for _ in cell.len()..*width {
                out.push(' ');
            }
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out.push('\n');
}
