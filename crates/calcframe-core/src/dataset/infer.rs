//! Date recognition for ambiguously-typed columns.
//!
//! Text columns often hold dates in disguise. After ingestion, each Text
//! column is sampled: if its first non-missing value parses as a date, the
//! whole column is reparsed. Promotion is whole-column-or-nothing: a single
//! later value that fails to parse leaves the column exactly as it was, and
//! the type is not promoted. Applied once per column at dataset
//! construction, never retroactively.

use chrono::NaiveDate;

use calcframe_engine::Value;

use super::{ColumnType, Dataset};

/// Date formats accepted during promotion, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d %b %Y",
    "%B %d, %Y",
];

/// Try to parse a single value as a date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Promote Text columns whose every value parses as a date.
pub fn recognize_dates(dataset: &mut Dataset) {
    let candidates: Vec<String> = dataset
        .schema
        .iter()
        .filter(|(_, column)| column.ctype == ColumnType::Text)
        .map(|(slug, _)| slug.clone())
        .collect();

    for slug in candidates {
        promote_column(dataset, &slug);
    }
}

fn promote_column(dataset: &mut Dataset, slug: &str) {
    let values = dataset.column_values(slug);

    // Sample the first entry; a column that doesn't open with a date is not
    // a date column.
    let first = values.iter().find(|v| !v.is_missing());
    let Some(Value::Text(sample)) = first else {
        return;
    };
    if parse_date(sample).is_none() {
        return;
    }

    let mut parsed: Vec<Value> = Vec::with_capacity(values.len());
    for value in &values {
        match value {
            Value::Text(text) => match parse_date(text) {
                Some(date) => parsed.push(Value::Date(date)),
                None => {
                    // Mixed content: leave the column completely unpromoted.
                    tracing::warn!(
                        column = slug,
                        value = text.as_str(),
                        "date promotion abandoned, value is not a date"
                    );
                    return;
                }
            },
            other => parsed.push(other.clone()),
        }
    }

    let mut parsed = parsed.into_iter();
    for row in &mut dataset.table {
        if let Some(date) = parsed.next() {
            row.insert(slug.to_string(), date);
        }
    }
    if let Some(column) = dataset.schema.get_mut(slug) {
        column.ctype = ColumnType::Date;
    }
    tracing::debug!(column = slug, "column promoted to date");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnRole, ColumnSchema, Schema};
    use calcframe_engine::Row;

    fn text_dataset(values: &[&str]) -> Dataset {
        let mut schema = Schema::new();
        schema.insert(
            "when",
            ColumnSchema::new("when", ColumnType::Text, ColumnRole::Dimension),
        );
        let table = values
            .iter()
            .map(|v| {
                let mut row = Row::new();
                row.insert("when".to_string(), Value::Text(v.to_string()));
                row
            })
            .collect();
        Dataset::new(schema, table)
    }

    #[test]
    fn test_all_dates_promotes_whole_column() {
        let mut dataset = text_dataset(&["2013-01-05", "2013-01-08", "2013-02-01"]);
        recognize_dates(&mut dataset);

        assert_eq!(dataset.schema.get("when").unwrap().ctype, ColumnType::Date);
        assert_eq!(
            dataset.table[0]["when"],
            Value::Date(NaiveDate::from_ymd_opt(2013, 1, 5).unwrap())
        );
    }

    #[test]
    fn test_partial_dates_leave_column_untouched() {
        let mut dataset = text_dataset(&["2013-01-05", "not a date", "2013-02-01"]);
        let before = dataset.table.clone();
        recognize_dates(&mut dataset);

        assert_eq!(dataset.schema.get("when").unwrap().ctype, ColumnType::Text);
        assert_eq!(dataset.table, before);
    }

    #[test]
    fn test_non_date_first_value_skips_column() {
        let mut dataset = text_dataset(&["lunch", "2013-01-05"]);
        recognize_dates(&mut dataset);
        assert_eq!(dataset.schema.get("when").unwrap().ctype, ColumnType::Text);
    }

    #[test]
    fn test_mixed_format_dates_promote() {
        let mut dataset = text_dataset(&["2013-01-05", "01/08/2013"]);
        recognize_dates(&mut dataset);
        assert_eq!(dataset.schema.get("when").unwrap().ctype, ColumnType::Date);
        assert_eq!(
            dataset.table[1]["when"],
            Value::Date(NaiveDate::from_ymd_opt(2013, 1, 8).unwrap())
        );
    }
}
