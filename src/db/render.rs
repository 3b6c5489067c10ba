//! Render result rows as a GitHub-flavoured markdown table

use serde_json::Value;

use super::connection::Row;

pub const NO_ROWS: &str = "No rows returned from the database.";

pub fn format_rows(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return NO_ROWS.to_string();
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(*h).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    out.push_str(&line(headers.iter().map(|h| h.to_string()), &widths));
    out.push('\n');
    out.push_str(&line(widths.iter().map(|w| "-".repeat(*w)), &widths));
    for row in cells {
        out.push('\n');
        out.push_str(&line(row.into_iter(), &widths));
    }
    out
}

fn line(values: impl Iterator<Item = String>, widths: &[usize]) -> String {
    let padded: Vec<String> = values
        .zip(widths)
        .map(|(v, w)| {
            let pad = w.saturating_sub(v.chars().count());
            format!(" {}{} ", v, " ".repeat(pad))
        })
        .collect();
    format!("|{}|", padded.join("|"))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.replace('|', "\\|").replace('\n', " "),
        other => other.to_string(),
    }
}
