//! Text table of service timings.

use super::analyze::ServiceRow;
use std::fmt::Write as _;

const NAME_WIDTH: usize = 26;
const CALL_INDENT: &str = "    ";

/// Render service rows (already ordered) as a table.
pub fn render(rows: &[ServiceRow]) -> String {
    let mut out = String::new();

    render_header(&mut out);
    for row in rows {
        render_service(&mut out, row);
    }
    render_footer(&mut out, rows);

    out
}

fn render_header(out: &mut String) {
    writeln!(
        out,
        "{:<NAME_WIDTH$} {:>6}  {:>6}  {:>9}",
        "Service", "Count", "Errors", "Total(s)"
    )
    .unwrap();
    writeln!(
        out,
        "{:<NAME_WIDTH$} {:>6}  {:>6}  {:>9}",
        "-".repeat(NAME_WIDTH),
        "------",
        "------",
        "---------"
    )
    .unwrap();
}

fn render_service(out: &mut String, row: &ServiceRow) {
    writeln!(
        out,
        "{:<NAME_WIDTH$} {:>6}  {:>6}  {:>9.3}",
        truncate(&row.name, NAME_WIDTH),
        row.count,
        row.errors,
        row.total.as_secs_f64()
    )
    .unwrap();

    let width = NAME_WIDTH - CALL_INDENT.len();
    for call in &row.calls {
        writeln!(
            out,
            "{CALL_INDENT}{:<width$} {:>6}  {:>6}  {:>9.3}",
            truncate(&call.label, width),
            call.count,
            "",
            call.total.as_secs_f64()
        )
        .unwrap();
    }
}

fn render_footer(out: &mut String, rows: &[ServiceRow]) {
    let count: u64 = rows.iter().map(|r| r.count).sum();
    let errors: u64 = rows.iter().map(|r| r.errors).sum();
    let total: f64 = rows.iter().map(|r| r.total.as_secs_f64()).sum();

    writeln!(
        out,
        "{:<NAME_WIDTH$} {:>6}  {:>6}  {:>9}",
        "-".repeat(NAME_WIDTH),
        "------",
        "------",
        "---------"
    )
    .unwrap();
    writeln!(
        out,
        "{:<NAME_WIDTH$} {:>6}  {:>6}  {:>9.3}",
        "TOTAL", count, errors, total
    )
    .unwrap();
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
