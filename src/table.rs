//! Plain-text table rendering for terminal previews.

use std::{borrow::Cow, fmt::Write as _};

use crate::{data::display_cell, frame::Row};

/// Cells wider than this are cut and suffixed with an ellipsis in previews.
pub const MAX_CELL_WIDTH: usize = 40;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| display_width(h).max(1))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let rule = rule_widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// Display strings for the first `limit` rows, long cells truncated.
pub fn preview_cells(rows: &[Row], limit: usize) -> Vec<Vec<String>> {
    rows.iter()
        .take(limit)
        .map(|row| {
            row.iter()
                .map(|cell| truncate_cell(&display_cell(cell.as_ref())))
                .collect()
        })
        .collect()
}

pub fn print_preview(headers: &[String], rows: &[Row], limit: usize) {
    print!("{}", render_table(headers, &preview_cells(rows, limit)));
}

fn truncate_cell(value: &str) -> String {
    if value.chars().count() <= MAX_CELL_WIDTH {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(MAX_CELL_WIDTH - 1).collect();
    cut.push('…');
    cut
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end_matches(' ').to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI colour sequences occupy no columns
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
