//! Output formatting for query results.
//!
//! Renders a [`Table`] as an ASCII table (like the MySQL CLI), a Markdown
//! table, or JSON.

use crate::models::{Table, Value};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// Markdown table format
    Markdown,
}

/// Render a table in the requested format.
pub fn render(table: &Table, format: OutputFormat, execution_time_ms: u64) -> String {
    match format {
        OutputFormat::Table => format_as_table(table, execution_time_ms),
        OutputFormat::Json => format_as_json(table),
        OutputFormat::Markdown => format_as_markdown(table),
    }
}

pub fn format_value(value: &Value) -> String {
    value.to_string()
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if right_align {
        format!("{}{}", fill, text)
    } else {
        format!("{}{}", text, fill)
    }
}

fn center(text: &str, width: usize) -> String {
    let total = width.saturating_sub(text.width());
    let left = total / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(total - left))
}

pub fn format_as_table(table: &Table, execution_time_ms: u64) -> String {
    if table.columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.name.width()).collect();
    for row in &table.rows {
        for (i, value) in row.values().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(format_value(value).width());
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", center(&col.name, *w)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in &table.rows {
        let row_str: String = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let value = row.get(i).unwrap_or(&Value::Null);
                let numeric = matches!(value, Value::Int(_) | Value::Float(_));
                format!("| {} ", pad(&format_value(value), *w, numeric))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&separator);

    let row_count = table.row_count();
    let row_text = if row_count == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "{} {} in set ({:.2} sec)\n",
        row_count,
        row_text,
        execution_time_ms as f64 / 1000.0
    ));

    output
}

pub fn format_as_markdown(table: &Table) -> String {
    if table.columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();

    let header: String = table
        .columns
        .iter()
        .map(|c| format!("| {} ", c.name))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);

    let sep: String = table.columns.iter().map(|_| "|---").collect::<String>() + "|\n";
    output.push_str(&sep);

    for row in &table.rows {
        let row_str: String = (0..table.column_count())
            .map(|i| {
                let value = row.get(i).unwrap_or(&Value::Null);
                format!("| {} ", format_value(value).replace('|', "\\|"))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&format!("\n*{} rows*", table.row_count()));

    output
}

pub fn format_as_json(table: &Table) -> String {
    serde_json::to_string_pretty(table).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, Row};

    fn sample() -> Table {
        Table::new(
            vec![Column::new("id", "INTEGER"), Column::new("name", "TEXT")],
            vec![
                Row(vec![Value::Int(1), Value::from("alice")]),
                Row(vec![Value::Int(20), Value::Null]),
            ],
        )
    }

    #[test]
    fn test_format_as_table() {
        let output = format_as_table(&sample(), 1500);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "+----+-------+");
        assert_eq!(lines[1], "| id | name  |");
        assert_eq!(lines[3], "|  1 | alice |");
        assert_eq!(lines[4], "| 20 | NULL  |");
        assert!(output.ends_with("2 rows in set (1.50 sec)\n"));
    }

    #[test]
    fn test_format_as_table_wide_characters() {
        let table = Table::new(
            vec![Column::new("名前", "TEXT")],
            vec![Row(vec![Value::from("太郎")]), Row(vec![Value::from("ab")])],
        );
        let output = format_as_table(&table, 0);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "+------+");
        assert_eq!(lines[3], "| 太郎 |");
        assert_eq!(lines[4], "| ab   |");
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_as_table(&Table::default(), 0), "Empty set");
        assert_eq!(format_as_markdown(&Table::default()), "*Empty set*");
    }

    #[test]
    fn test_format_as_markdown() {
        let output = format_as_markdown(&sample());
        assert!(output.starts_with("| id | name |\n|---|---|\n| 1 | alice |\n"));
        assert!(output.ends_with("*2 rows*"));
    }

    #[test]
    fn test_format_as_json() {
        let output = format_as_json(&sample());
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["rows"][0][1], "alice");
        assert_eq!(json["columns"][0]["name"], "id");
        assert!(json["rows"][1][1].is_null());
    }
}
