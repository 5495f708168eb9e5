//! Table and JSON output.

use serde_json::Value;

use crate::error::Result;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub const fn from_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Human
        }
    }
}

/// Print rows as an aligned table, or as a JSON array of objects keyed by
/// the lowercased headers.
pub fn emit(format: OutputFormat, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    match format {
        OutputFormat::Human => {
            if rows.is_empty() {
                println!("Nothing to show.");
            } else {
                print!("{}", render_table(headers, rows));
            }
        }
        OutputFormat::Json => {
            let objects: Vec<Value> = rows
                .iter()
                .map(|row| {
                    Value::Object(
                        headers
                            .iter()
                            .zip(row)
                            .map(|(h, cell)| (h.to_lowercase(), Value::String(cell.clone())))
                            .collect(),
                    )
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&objects)?);
        }
    }
    Ok(())
}

/// Aligned columns, two spaces apart, one line per row.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        let mut out = padded.join("  ").trim_end().to_string();
        out.push('\n');
        out
    };

    let mut out = line(headers.to_vec());
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

/// Print a single message, or `{"status": …}` in JSON mode.
pub fn status(format: OutputFormat, message: &str) -> Result<()> {
    match format {
        OutputFormat::Human => println!("{message}"),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "status": message }));
        }
    }
    Ok(())
}
