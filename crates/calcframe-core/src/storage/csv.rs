//! CSV ingestion: header labels to slugs, typed columns, date recognition.

use std::path::Path;

use calcframe_engine::{Row, Table, Value};

use crate::dataset::infer::recognize_dates;
use crate::dataset::slug::{RESERVED_KEYS, slugify_columns};
use crate::dataset::{ColumnRole, ColumnSchema, ColumnType, Dataset, Schema};
use crate::error::{CalcError, Result};

/// Parse a CSV file into a dataset.
pub fn parse_dataset(path: &Path) -> Result<Dataset> {
    let content = std::fs::read_to_string(path)?;
    parse_dataset_str(&content)
}

/// Parse CSV text into a dataset.
///
/// The first line holds column labels; labels become slugs, column types are
/// observed from the data, non-numeric columns ingest as dimensions and
/// numeric ones as measures. Text columns then go through date recognition.
pub fn parse_dataset_str(content: &str) -> Result<Dataset> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());

    let header = lines.next().ok_or(CalcError::EmptyCsv)?;
    let labels = parse_csv_line(header);
    if labels.iter().all(|l| l.is_empty()) {
        return Err(CalcError::EmptyCsv);
    }
    let slugs = slugify_columns(&labels);

    let mut table = Table::new();
    for line in lines {
        let fields = parse_csv_line(line);
        let mut row = Row::new();
        for (i, slug) in slugs.iter().enumerate() {
            let value = fields.get(i).map(|f| parse_csv_field(f)).unwrap_or(Value::Null);
            row.insert(slug.clone(), value);
        }
        table.push(row);
    }

    let mut schema = Schema::new();
    for (label, slug) in labels.iter().zip(&slugs) {
        let values: Vec<Value> = table
            .iter()
            .map(|row| row.get(slug).cloned().unwrap_or(Value::Null))
            .collect();
        let ctype = ColumnType::observe(&values);
        let role = if RESERVED_KEYS.contains(&label.as_str()) {
            ColumnRole::Id
        } else if ctype.is_numeric() {
            ColumnRole::Measure
        } else {
            ColumnRole::Dimension
        };
        schema.insert(slug.clone(), ColumnSchema::new(label.clone(), ctype, role));
    }

    let mut dataset = Dataset::new(schema, table);
    recognize_dates(&mut dataset);
    Ok(dataset)
}

/// Parse a single CSV line, handling quoted fields.
pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                // Check for escaped quote
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => {
                    in_quotes = true;
                    field_was_quoted = true;
                }
                ',' => {
                    if field_was_quoted {
                        fields.push(current.clone());
                    } else {
                        fields.push(current.trim().to_string());
                    }
                    current = String::new();
                    field_was_quoted = false;
                }
                _ => current.push(c),
            }
        }
    }
    if field_was_quoted {
        fields.push(current);
    } else {
        fields.push(current.trim().to_string());
    }
    fields
}

/// Parse a CSV field into a typed value.
/// - Empty string -> missing
/// - Valid integer or float -> number (unless it has leading zeros like "007")
/// - Otherwise -> text
pub(crate) fn parse_csv_field(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }

    let trimmed = field.trim();
    if field != trimmed {
        // Explicit surrounding whitespace (typically from quoted CSV fields)
        // stays text, exactly as written.
        return Value::Text(field.to_string());
    }

    // Preserve strings that look like numbers but have leading zeros
    // (e.g., "007", "00123") unless they're just "0" or start with "0."
    if trimmed.starts_with('0')
        && trimmed.len() > 1
        && !trimmed.starts_with("0.")
        && trimmed.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
    {
        return Value::Text(trimmed.to_string());
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Float(f);
    }

    Value::Text(trimmed.to_string())
}
