//! Output formatting for CLI

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON, `{}` if the value cannot be serialized
pub fn to_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// Rounded table of rows
pub fn to_table<R: Tabled>(rows: impl IntoIterator<Item = R>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

/// Print rows as JSON or a table; text mode uses `text` per row
pub fn print_rows<R>(rows: Vec<R>, format: OutputFormat, text: impl Fn(&R) -> String)
where
    R: Serialize + Tabled,
{
    match format {
        OutputFormat::Json => println!("{}", to_json(&rows)),
        OutputFormat::Table => println!("{}", to_table(rows)),
        OutputFormat::Text => {
            for row in &rows {
                println!("{}", text(row));
            }
        }
    }
}
