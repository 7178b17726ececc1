// =============================================================================
// format.rs — ROWS IN, MONOSPACE OUT
// =============================================================================
//
// Turns a ScanResult into a fixed-width text table and wraps it in <pre> so
// Telegram renders it in monospace. Columns are right-aligned, separated by
// two spaces, in the order the screener sent them. Rows keep their order.
//
// Widths are measured on the raw text; escaping happens afterwards so that
// `&amp;` does not count as five characters of padding.
// =============================================================================

use serde_json::Value;

use crate::models::{ScanResult, ScanRow};

/// Cell text for a key a row did not carry at all.
const MISSING_CELL: &str = "NaN";

/// Build the full success message: header line, title, table.
pub fn render_scan_message(title: &str, result: &ScanResult) -> String {
    format!(
        "Chartink Data:\n{}\n<pre>{}</pre>",
        escape(title),
        escape(&render_table(&result.rows))
    )
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Render rows as a right-aligned text table with a header line.
///
/// The column set is the union of every row's keys in first-seen order, so
/// ragged rows still line up.
pub fn render_table(rows: &[ScanRow]) -> String {
    let columns = collect_columns(rows);
    if columns.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| row.get(*col).map(cell_text).unwrap_or_else(|| MISSING_CELL.to_string()))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_line(columns.iter().map(|c| c.to_string()), &widths));
    for row in cells {
        lines.push(render_line(row.into_iter(), &widths));
    }
    lines.join("\n")
}

fn collect_columns(rows: &[ScanRow]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }
    columns
}

fn render_line(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:>width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ")
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}
