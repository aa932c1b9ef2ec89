//! JSON export of dataset tables through the value codec.

use std::path::Path;

use serde_json::Map;

use calcframe_engine::codec::json_value;

use crate::dataset::Dataset;
use crate::error::Result;

/// Encode a dataset's table as a JSON array of row objects.
///
/// Every schema column appears in every row; missing values encode as null.
/// The codec is total, so export never fails on data.
pub fn table_json(dataset: &Dataset) -> serde_json::Value {
    let rows = dataset
        .table
        .iter()
        .map(|row| {
            let mut object = Map::with_capacity(dataset.schema.len());
            for (slug, _) in dataset.schema.iter() {
                let value = row.get(slug).cloned().unwrap_or(calcframe_engine::Value::Null);
                object.insert(slug.clone(), json_value(&value));
            }
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(rows)
}

/// Encode the aggregate sub-dataset for a group column, if one exists.
pub fn aggregate_json(dataset: &Dataset, group_slug: &str) -> Option<serde_json::Value> {
    dataset.aggregate(group_slug).map(table_json)
}
/// Encode a dataset's schema as a JSON object keyed by slug.
pub fn schema_json(dataset: &Dataset) -> serde_json::Value {
    let mut object = Map::with_capacity(dataset.schema.len());
    for (slug, column) in dataset.schema.iter() {
        object.insert(
            slug.clone(),
            serde_json::to_value(column).unwrap_or(serde_json::Value::Null),
        );
    }
    serde_json::Value::Object(object)
}

/// Write a dataset's table (and any aggregates) to a JSON file.
pub fn write_json(path: &Path, dataset: &Dataset) -> Result<()> {
    let mut document = Map::new();
    document.insert("table".to_string(), table_json(dataset));

    let mut groups = dataset.aggregate_groups();
    groups.sort();
    if !groups.is_empty() {
        let mut aggregates = Map::new();
        for group in groups {
            if let Some(encoded) = aggregate_json(dataset, &group) {
                aggregates.insert(group, encoded);
            }
        }
        document.insert("aggregates".to_string(), serde_json::Value::Object(aggregates));
    }

    let content = serde_json::to_string_pretty(&serde_json::Value::Object(document))
        .unwrap_or_else(|_| "{}".to_string());
    std::fs::write(path, content)?;
    Ok(())
}
