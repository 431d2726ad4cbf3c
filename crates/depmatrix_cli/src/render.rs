//! Plain-text rendering of matrices, summaries, users and history.
//!
//! Cell glyphs: `#` diagonal, `-` lower triangle, `x` dependency, `.` none.

use depmatrix_core::{HistoryRecord, MatrixRecord, MatrixSummary, User};
use std::fmt::Write as _;

const CELL_WIDTH: usize = 4;

/// Renders the triangular table with row, column, category and grand totals.
pub fn render_matrix(record: &MatrixRecord) -> String {
    let matrix = &record.data;
    let totals = matrix.compute_totals();
    let mut out = String::new();

    let _ = writeln!(out, "{} ({})", record.title, record.id);
    if !record.description.is_empty() {
        let _ = writeln!(out, "{}", record.description);
    }
    out.push('\n');

    if matrix.rows().is_empty() {
        out.push_str("(no attributes)\n");
        return out;
    }

    let category_width = column_width(
        "Category",
        matrix.rows().iter().map(|row| row.category.as_str()),
    );
    let name_width = column_width(
        "Attribute",
        matrix.rows().iter().map(|row| row.name.as_str()),
    );
    let id_width = column_width(
        "Id",
        matrix.columns().iter().map(|column| column.name.as_str()),
    );

    let _ = write!(
        out,
        "{:<category_width$} | {:>id_width$} | {:<name_width$} |",
        "Category", "Id", "Attribute"
    );
    for column in matrix.columns() {
        let _ = write!(out, "{:>CELL_WIDTH$}", column.name);
    }
    out.push_str(" | Total\n");

    for group in matrix.category_groups() {
        for (index, row) in group.rows.iter().enumerate() {
            // Category label spans its rows.
            let category = if index == 0 { group.category } else { "" };
            let _ = write!(
                out,
                "{category:<category_width$} | {:>id_width$} | {:<name_width$} |",
                row.id, row.name
            );
            for column in matrix.columns() {
                let glyph = if row.id == column.id {
                    '#'
                } else if row.id > column.id {
                    '-'
                } else if matrix.get_dependency(row.id, column.id) {
                    'x'
                } else {
                    '.'
                };
                let _ = write!(out, "{glyph:>CELL_WIDTH$}");
            }
            let _ = writeln!(out, " | {:>5}", totals.row(row.id));
        }
    }

    let label_width = category_width + id_width + name_width + 7;
    let _ = write!(out, "{:<label_width$}|", "Column totals");
    for column in matrix.columns() {
        let _ = write!(out, "{:>CELL_WIDTH$}", totals.column(column.id));
    }
    let _ = writeln!(out, " | {:>5}", totals.grand_total());

    out.push_str("\nCategory totals:\n");
    for group in matrix.category_groups() {
        let _ = writeln!(
            out,
            "  {:<category_width$}  {}",
            group.category,
            totals.category(group.category)
        );
    }
    out
}

pub fn render_summaries(summaries: &[MatrixSummary]) -> String {
    if summaries.is_empty() {
        return "no matrices\n".to_string();
    }
    let mut out = String::new();
    for summary in summaries {
        let _ = writeln!(
            out,
            "{}  {}  attributes={}  created={}",
            summary.id,
            summary.title,
            summary.attribute_count,
            summary.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    out
}

pub fn render_users(users: &[User]) -> String {
    let mut out = String::new();
    for user in users {
        let _ = writeln!(
            out,
            "{}  {:<6} {}  <{}>",
            user.id,
            user.role.as_str(),
            user.username,
            user.email
        );
    }
    out
}

/// One line per entry, newest first as given.
pub fn render_history(records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "no history entries\n".to_string();
    }
    let mut out = String::new();
    for record in records {
        let entry = &record.entry;
        let matrix = entry
            .matrix_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "#{:<5} {}  {:<14} {:<6} matrix={}  {}",
            record.id,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action.label(),
            entry.user_role.as_str(),
            matrix,
            entry.describe()
        );
    }
    out
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|value| value.chars().count())
        .chain(std::iter::once(header.chars().count()))
        .max()
        .unwrap_or(0)
}
