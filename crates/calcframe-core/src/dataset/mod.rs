//! Dataset model: schema, row-major table, derived aggregate tables.

pub mod infer;
pub mod slug;
pub mod store;

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use calcframe_engine::{Row, Table, Value};

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Date,
    Boolean,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Infer a column type from a set of values.
    ///
    /// All-integer columns stay Integer; any float makes the column Float;
    /// any text makes it Text. Missing values don't vote.
    pub fn observe(values: &[Value]) -> ColumnType {
        let mut seen = None;
        for value in values {
            let observed = match value {
                Value::Null => continue,
                Value::Bool(_) => ColumnType::Boolean,
                Value::Int(_) => ColumnType::Integer,
                Value::Float(f) if f.is_nan() => continue,
                Value::Float(_) => ColumnType::Float,
                Value::Text(_) => ColumnType::Text,
                Value::Date(_) => ColumnType::Date,
            };
            seen = Some(match seen {
                None => observed,
                Some(prev) if prev == observed => observed,
                Some(ColumnType::Integer) if observed == ColumnType::Float => ColumnType::Float,
                Some(ColumnType::Float) if observed == ColumnType::Integer => ColumnType::Float,
                Some(_) => ColumnType::Text,
            });
        }
        seen.unwrap_or(ColumnType::Text)
    }
}

/// What a column may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    /// Grouping/aggregation key.
    Dimension,
    /// Numeric observation.
    Measure,
    /// Storage row identity.
    Id,
}

/// Per-column schema entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub label: String,
    #[serde(rename = "type")]
    pub ctype: ColumnType,
    pub role: ColumnRole,
}

impl ColumnSchema {
    pub fn new(label: impl Into<String>, ctype: ColumnType, role: ColumnRole) -> Self {
        ColumnSchema {
            label: label.into(),
            ctype,
            role,
        }
    }
}

/// Ordered mapping from column slug to its schema entry.
///
/// Column order is ingestion order; slugs are unique and immutable once
/// assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<(String, ColumnSchema)>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.columns.iter().any(|(s, _)| s == slug)
    }

    pub fn get(&self, slug: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|(s, _)| s == slug)
            .map(|(_, c)| c)
    }

    pub fn get_mut(&mut self, slug: &str) -> Option<&mut ColumnSchema> {
        self.columns
            .iter_mut()
            .find(|(s, _)| s == slug)
            .map(|(_, c)| c)
    }

    /// Add a column. The slug must not already exist.
    pub fn insert(&mut self, slug: impl Into<String>, column: ColumnSchema) {
        let slug = slug.into();
        debug_assert!(!self.contains(&slug), "duplicate column slug {slug}");
        self.columns.push((slug, column));
    }

    pub fn remove(&mut self, slug: &str) -> Option<ColumnSchema> {
        let index = self.columns.iter().position(|(s, _)| s == slug)?;
        Some(self.columns.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnSchema)> {
        self.columns.iter().map(|(s, c)| (s, c))
    }

    /// All column slugs, in schema order.
    pub fn slugs(&self) -> Vec<String> {
        self.columns.iter().map(|(s, _)| s.clone()).collect()
    }
}

/// A derived per-group table, stamped with the table version it was built
/// from so staleness is detectable.
#[derive(Debug, Clone)]
struct Aggregate {
    built_from: u64,
    data: Dataset,
}

/// A tabular dataset: schema + row-major table, plus one derived aggregate
/// sub-dataset per group column that hosts grouped calculations.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub schema: Schema,
    pub table: Table,
    version: u64,
    aggregates: HashMap<String, Aggregate>,
}

impl Dataset {
    pub fn new(schema: Schema, table: Table) -> Self {
        Dataset {
            schema,
            table,
            version: 0,
            aggregates: HashMap::new(),
        }
    }

    /// The values of one column, in row order. Missing entries are null.
    pub fn column_values(&self, slug: &str) -> Vec<Value> {
        self.table
            .iter()
            .map(|row| row.get(slug).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Add a column to the table and schema. `values` must be in row order;
    /// short inputs are padded with nulls.
    pub fn add_column(&mut self, slug: &str, column: ColumnSchema, values: Vec<Value>) {
        let mut values = values.into_iter();
        for row in &mut self.table {
            row.insert(
                slug.to_string(),
                values.next().unwrap_or(Value::Null),
            );
        }
        self.schema.insert(slug, column);
        self.version += 1;
    }

    /// Remove a column from the table and schema.
    pub fn remove_column(&mut self, slug: &str) -> Option<ColumnSchema> {
        let removed = self.schema.remove(slug)?;
        for row in &mut self.table {
            row.remove(slug);
        }
        self.version += 1;
        Some(removed)
    }

    /// Read access to the aggregate sub-dataset for a group column, if one
    /// has been built.
    pub fn aggregate(&self, group_slug: &str) -> Option<&Dataset> {
        self.aggregates.get(group_slug).map(|a| &a.data)
    }

    /// Whether any aggregate sub-datasets exist.
    pub fn has_aggregates(&self) -> bool {
        !self.aggregates.is_empty()
    }

    /// Group columns with a built aggregate.
    pub fn aggregate_groups(&self) -> Vec<String> {
        self.aggregates.keys().cloned().collect()
    }

    /// The aggregate sub-dataset for a group column, built lazily and
    /// rebuilt if the main table has changed since it was last derived.
    /// Columns other than the group key are carried over by group key.
    pub fn ensure_aggregate(&mut self, group_slug: &str) -> &mut Dataset {
        let stale = match self.aggregates.get(group_slug) {
            Some(aggregate) => aggregate.built_from != self.version,
            None => true,
        };

        if stale {
            let rebuilt = self.build_aggregate(group_slug);
            self.aggregates.insert(
                group_slug.to_string(),
                Aggregate {
                    built_from: self.version,
                    data: rebuilt,
                },
            );
        }

        &mut self
            .aggregates
            .get_mut(group_slug)
            .expect("aggregate was just inserted")
            .data
    }

    /// Drop the aggregate sub-dataset for a group column.
    pub fn remove_aggregate(&mut self, group_slug: &str) {
        self.aggregates.remove(group_slug);
    }

    fn build_aggregate(&self, group_slug: &str) -> Dataset {
        let keys = self.distinct_group_keys(group_slug);

        let mut schema = Schema::new();
        let group_column = self
            .schema
            .get(group_slug)
            .cloned()
            .unwrap_or_else(|| {
                ColumnSchema::new(group_slug, ColumnType::Text, ColumnRole::Dimension)
            });
        schema.insert(
            group_slug,
            ColumnSchema::new(group_column.label, group_column.ctype, ColumnRole::Dimension),
        );

        // Carry over previously computed grouped columns by key.
        let previous = self.aggregates.get(group_slug).map(|a| &a.data);
        if let Some(prev) = previous {
            for (slug, column) in prev.schema.iter() {
                if slug != group_slug {
                    schema.insert(slug.clone(), column.clone());
                }
            }
        }

        let mut table = Table::with_capacity(keys.len());
        for key in keys {
            let mut row = Row::new();
            if let Some(prev) = previous {
                if let Some(prev_row) = prev
                    .table
                    .iter()
                    .find(|r| r.get(group_slug).is_some_and(|v| *v == key))
                {
                    row = prev_row.clone();
                }
            }
            row.insert(group_slug.to_string(), key);
            table.push(row);
        }

        Dataset::new(schema, table)
    }

    /// Distinct group key values, ordered by first appearance in the table.
    /// Missing keys do not form a group.
    fn distinct_group_keys(&self, group_slug: &str) -> Vec<Value> {
        let mut keys: Vec<Value> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for row in &self.table {
            let Some(value) = row.get(group_slug) else { continue };
            if value.is_missing() {
                continue;
            }
            if seen.insert(value.key_string()) {
                keys.push(value.clone());
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset() -> Dataset {
        let mut schema = Schema::new();
        schema.insert(
            "food_type",
            ColumnSchema::new("food_type", ColumnType::Text, ColumnRole::Dimension),
        );
        schema.insert(
            "amount",
            ColumnSchema::new("amount", ColumnType::Float, ColumnRole::Measure),
        );

        let table = vec![
            row(&[
                ("food_type", Value::Text("lunch".to_string())),
                ("amount", Value::Float(2.0)),
            ]),
            row(&[
                ("food_type", Value::Text("deserts".to_string())),
                ("amount", Value::Float(3.5)),
            ]),
            row(&[
                ("food_type", Value::Text("lunch".to_string())),
                ("amount", Value::Float(4.0)),
            ]),
        ];
        Dataset::new(schema, table)
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_observe_column_types() {
        assert_eq!(
            ColumnType::observe(&[Value::Int(1), Value::Int(2)]),
            ColumnType::Integer
        );
        assert_eq!(
            ColumnType::observe(&[Value::Int(1), Value::Float(2.5)]),
            ColumnType::Float
        );
        assert_eq!(
            ColumnType::observe(&[Value::Int(1), Value::Text("x".to_string())]),
            ColumnType::Text
        );
        assert_eq!(ColumnType::observe(&[Value::Null]), ColumnType::Text);
    }

    #[test]
    fn test_add_and_remove_column_round_trip() {
        let mut dataset = sample_dataset();
        let before = dataset.schema.slugs();

        dataset.add_column(
            "total",
            ColumnSchema::new("total", ColumnType::Float, ColumnRole::Measure),
            vec![Value::Float(3.0), Value::Float(4.5), Value::Float(5.0)],
        );
        assert!(dataset.schema.contains("total"));
        assert_eq!(dataset.table[1]["total"], Value::Float(4.5));

        dataset.remove_column("total");
        assert_eq!(dataset.schema.slugs(), before);
        assert!(dataset.table.iter().all(|r| !r.contains_key("total")));
    }

    #[test]
    fn test_aggregate_keys_in_first_appearance_order() {
        let mut dataset = sample_dataset();
        let aggregate = dataset.ensure_aggregate("food_type");
        let keys: Vec<&Value> = aggregate
            .table
            .iter()
            .map(|r| &r["food_type"])
            .collect();
        assert_eq!(
            keys,
            vec![
                &Value::Text("lunch".to_string()),
                &Value::Text("deserts".to_string())
            ]
        );
    }

    #[test]
    fn test_stale_aggregate_is_rebuilt_and_preserves_columns() {
        let mut dataset = sample_dataset();
        dataset.ensure_aggregate("food_type").add_column(
            "total",
            ColumnSchema::new("total", ColumnType::Float, ColumnRole::Measure),
            vec![Value::Float(6.0), Value::Float(3.5)],
        );

        // A table mutation makes the cached aggregate stale.
        dataset.add_column(
            "flag",
            ColumnSchema::new("flag", ColumnType::Integer, ColumnRole::Measure),
            vec![Value::Int(1), Value::Int(1), Value::Int(1)],
        );

        let aggregate = dataset.ensure_aggregate("food_type");
        assert_eq!(aggregate.table.len(), 2);
        assert_eq!(aggregate.table[0]["total"], Value::Float(6.0));
        assert_eq!(aggregate.table[1]["total"], Value::Float(3.5));
    }
}
