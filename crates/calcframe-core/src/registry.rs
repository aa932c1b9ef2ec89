//! Calculation lifecycle: create, find, delete, list.
//!
//! A calculation starts `Pending` once its formula is accepted, and becomes
//! `Ready` only when its column is materialized in the dataset. Both steps
//! happen inside one `create` call; a failure at any point discards the
//! pending definition and leaves the dataset untouched, so callers never
//! observe a half-applied calculation.
//!
//! Formula evaluation runs outside the snapshot lock (it only needs a copy
//! of the table), but each dataset's write gate is held across
//! evaluate-then-commit so no competing mutation can change the table
//! between snapshot and publish.

use std::collections::HashSet;
use std::sync::Arc;

use calcframe_engine::{FormulaEvaluator, RhaiEvaluator, Value};

use crate::calculation::{Calculation, CalculationRecord, CalculationState};
use crate::dataset::slug::unique_slug;
use crate::dataset::store::DatasetStore;
use crate::dataset::{ColumnRole, ColumnSchema, ColumnType};
use crate::error::{CalcError, Result};

/// Create/find/delete calculations for the datasets in a store.
pub struct CalculationRegistry {
    store: Arc<DatasetStore>,
    evaluator: Box<dyn FormulaEvaluator>,
}

impl CalculationRegistry {
    /// Registry over `store` with a caller-supplied formula grammar.
    pub fn new(store: Arc<DatasetStore>, evaluator: Box<dyn FormulaEvaluator>) -> Self {
        CalculationRegistry { store, evaluator }
    }

    /// Registry with the default Rhai formula grammar.
    pub fn with_rhai(store: Arc<DatasetStore>) -> Self {
        Self::new(store, Box::new(RhaiEvaluator::new()))
    }

    pub fn store(&self) -> &Arc<DatasetStore> {
        &self.store
    }

    /// Create a calculation and materialize its column.
    ///
    /// Validates `formula` against the dataset's current column slugs,
    /// evaluates it (row-wise, or once per group key when `group` is set),
    /// then commits the new column and the `Ready` record as one atomic
    /// step. Any failure leaves dataset and registry unchanged.
    pub fn create(
        &self,
        dataset_id: &str,
        formula: &str,
        name: &str,
        group: Option<&str>,
    ) -> Result<CalculationRecord> {
        let entry = self.store.find(dataset_id)?;
        let _gate = entry.lock_writes();

        // Snapshot under the read lock; evaluation happens on the copy.
        let (allowed, target_slug, table) = {
            let state = entry.read();

            if state
                .calculations
                .iter()
                .any(|c| c.matches(name, group))
            {
                return Err(CalcError::DuplicateCalculation(name.to_string()));
            }

            if let Some(group_slug) = group {
                match state.dataset.schema.get(group_slug) {
                    Some(column) if column.role == ColumnRole::Dimension => {}
                    _ => return Err(CalcError::InvalidGroup(group_slug.to_string())),
                }
            }

            let allowed: HashSet<String> =
                state.dataset.schema.slugs().into_iter().collect();

            // The new column's slug must not collide with the table it lands
            // in, nor with the main schema.
            let mut taken = state.dataset.schema.slugs();
            if let Some(group_slug) = group {
                if let Some(aggregate) = state.dataset.aggregate(group_slug) {
                    taken.extend(aggregate.schema.slugs());
                }
            }
            let target_slug = unique_slug(name, &taken);

            (allowed, target_slug, state.dataset.table.clone())
        };

        let mut calculation =
            Calculation::pending(name, formula, group.map(String::from), target_slug.as_str());

        let compiled = self.evaluator.validate(formula, &allowed)?;

        // Evaluate off the critical section, then commit.
        match group {
            None => {
                let values = self.evaluator.evaluate(&compiled, &table)?;
                let column = column_schema_for(name, &values);

                let mut state = entry.write();
                state.dataset.add_column(&target_slug, column, values);
                calculation.state = CalculationState::Ready;
                state.calculations.push(calculation.clone());
            }
            Some(group_slug) => {
                let results = self.evaluator.evaluate_grouped(&compiled, &table, group_slug)?;

                let mut state = entry.write();
                let aggregate = state.dataset.ensure_aggregate(group_slug);
                let values = align_to_groups(aggregate, group_slug, results);
                let column = column_schema_for(name, &values);
                aggregate.add_column(&target_slug, column, values);
                calculation.state = CalculationState::Ready;
                state.calculations.push(calculation.clone());
            }
        }

        tracing::info!(
            dataset = dataset_id,
            name,
            group = group.unwrap_or(""),
            slug = target_slug.as_str(),
            "calculation created"
        );
        Ok(calculation.clean_record())
    }

    /// Find the unique calculation matching `(dataset_id, name, group)`.
    pub fn find(
        &self,
        dataset_id: &str,
        name: &str,
        group: Option<&str>,
    ) -> Result<CalculationRecord> {
        let entry = self
            .store
            .find(dataset_id)
            .map_err(|_| CalcError::CalculationNotFound)?;
        let state = entry.read();
        state
            .calculations
            .iter()
            .find(|c| c.matches(name, group))
            .map(Calculation::clean_record)
            .ok_or(CalcError::CalculationNotFound)
    }

    /// Delete a calculation and its column as one atomic step.
    pub fn delete(
        &self,
        dataset_id: &str,
        name: &str,
        group: Option<&str>,
    ) -> Result<CalculationRecord> {
        // A missing dataset and a missing calculation are the same failure
        // from the caller's side: the combination does not exist.
        let entry = self
            .store
            .find(dataset_id)
            .map_err(|_| CalcError::CalculationNotFound)?;
        let _gate = entry.lock_writes();

        let mut state = entry.write();
        let index = state
            .calculations
            .iter()
            .position(|c| c.matches(name, group))
            .ok_or(CalcError::CalculationNotFound)?;
        let calculation = state.calculations.remove(index);

        match &calculation.group {
            None => {
                state.dataset.remove_column(&calculation.target_slug);
            }
            Some(group_slug) => {
                let remaining = {
                    let aggregate = state.dataset.ensure_aggregate(group_slug);
                    aggregate.remove_column(&calculation.target_slug);
                    aggregate.schema.len()
                };
                // An aggregate exists only to host grouped calculations;
                // drop it once the group column is all that's left.
                if remaining <= 1 {
                    state.dataset.remove_aggregate(group_slug);
                }
            }
        }

        tracing::info!(
            dataset = dataset_id,
            name,
            group = group.unwrap_or(""),
            "calculation deleted"
        );
        Ok(calculation.clean_record())
    }

    /// All calculations for a dataset, as clean records, in definition order.
    pub fn list(&self, dataset_id: &str) -> Result<Vec<CalculationRecord>> {
        let entry = self.store.find(dataset_id)?;
        let state = entry.read();
        Ok(state
            .calculations
            .iter()
            .map(Calculation::clean_record)
            .collect())
    }
}

/// Schema entry for a computed column, typed from its values.
fn column_schema_for(name: &str, values: &[Value]) -> ColumnSchema {
    let ctype = ColumnType::observe(values);
    let role = if ctype.is_numeric() {
        ColumnRole::Measure
    } else {
        ColumnRole::Dimension
    };
    ColumnSchema::new(name, ctype, role)
}

/// Order grouped results to match the aggregate table's rows. Group keys
/// with no result (none in practice: both derive from the same table) are
/// null.
fn align_to_groups(
    aggregate: &crate::dataset::Dataset,
    group_slug: &str,
    results: Vec<(Value, Value)>,
) -> Vec<Value> {
    aggregate
        .table
        .iter()
        .map(|row| {
            let Some(key) = row.get(group_slug) else {
                return Value::Null;
            };
            results
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Schema};
    use calcframe_engine::Row;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn sample_store() -> Arc<DatasetStore> {
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

        let store = Arc::new(DatasetStore::new());
        store.insert("ds", Dataset::new(schema, table));
        store
    }

    #[test]
    fn test_create_materializes_ready_column() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store.clone());

        let record = registry.create("ds", "amount + 1", "total", None).unwrap();
        assert_eq!(record.state, CalculationState::Ready);

        let records = registry.list("ds").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "total");
        assert_eq!(records[0].state, CalculationState::Ready);

        let entry = store.find("ds").unwrap();
        let state = entry.read();
        let values = state.dataset.column_values("total");
        assert_eq!(
            values,
            vec![Value::Float(3.0), Value::Float(4.5), Value::Float(5.0)]
        );
    }

    #[test]
    fn test_create_on_missing_dataset() {
        let registry = CalculationRegistry::with_rhai(Arc::new(DatasetStore::new()));
        let err = registry.create("nope", "1 + 1", "x", None).unwrap_err();
        assert!(matches!(err, CalcError::DatasetNotFound));
    }

    #[test]
    fn test_failed_create_is_a_no_op() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store.clone());

        let (schema_before, table_before) = {
            let entry = store.find("ds").unwrap();
            let state = entry.read();
            (state.dataset.schema.clone(), state.dataset.table.clone())
        };

        let err = registry.create("ds", "amount +", "bad", None).unwrap_err();
        assert!(matches!(err, CalcError::Formula(_)));

        let entry = store.find("ds").unwrap();
        let state = entry.read();
        assert_eq!(state.dataset.schema, schema_before);
        assert_eq!(state.dataset.table, table_before);
        assert!(registry.list("ds").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_column_reference_is_a_no_op() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store.clone());

        let err = registry
            .create("ds", "amount + bogus", "bad", None)
            .unwrap_err();
        assert!(matches!(err, CalcError::Formula(_)));
        assert!(registry.list("ds").unwrap().is_empty());
    }

    #[test]
    fn test_create_delete_round_trip_restores_columns() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store.clone());

        let slugs_before = {
            let entry = store.find("ds").unwrap();
            let state = entry.read();
            state.dataset.schema.slugs()
        };

        registry.create("ds", "amount * 2", "double", None).unwrap();
        registry.delete("ds", "double", None).unwrap();

        let entry = store.find("ds").unwrap();
        let state = entry.read();
        assert_eq!(state.dataset.schema.slugs(), slugs_before);
        assert!(state.dataset.table.iter().all(|r| !r.contains_key("double")));
        assert!(registry.list("ds").unwrap().is_empty());
    }

    #[test]
    fn test_grouped_create_leaves_main_table_unchanged() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store.clone());

        let table_before = {
            let entry = store.find("ds").unwrap();
            let state = entry.read();
            state.dataset.table.clone()
        };

        registry
            .create("ds", "sum(amount)", "total_by_type", Some("food_type"))
            .unwrap();

        let entry = store.find("ds").unwrap();
        let state = entry.read();
        assert_eq!(state.dataset.table, table_before);

        let aggregate = state.dataset.aggregate("food_type").unwrap();
        assert_eq!(aggregate.table.len(), 2);
        assert_eq!(aggregate.table[0]["food_type"], Value::Text("lunch".to_string()));
        assert_eq!(aggregate.table[0]["total_by_type"], Value::Float(6.0));
        assert_eq!(aggregate.table[1]["total_by_type"], Value::Float(3.5));
    }

    #[test]
    fn test_group_must_be_a_dimension() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store);

        let err = registry
            .create("ds", "sum(amount)", "t", Some("amount"))
            .unwrap_err();
        assert!(matches!(err, CalcError::InvalidGroup(_)));

        let registry2 = CalculationRegistry::with_rhai(sample_store());
        let err = registry2
            .create("ds", "sum(amount)", "t", Some("missing"))
            .unwrap_err();
        assert!(matches!(err, CalcError::InvalidGroup(_)));
    }

    #[test]
    fn test_duplicate_triple_is_rejected() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store);

        registry.create("ds", "amount + 1", "total", None).unwrap();
        let err = registry.create("ds", "amount + 2", "total", None).unwrap_err();
        assert!(matches!(err, CalcError::DuplicateCalculation(_)));

        // Same name under a group is a different calculation.
        registry
            .create("ds", "sum(amount)", "total", Some("food_type"))
            .unwrap();
    }

    #[test]
    fn test_find_matches_exact_triple() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store);

        registry.create("ds", "amount + 1", "total", None).unwrap();

        let record = registry.find("ds", "total", None).unwrap();
        assert_eq!(record.formula, "amount + 1");
        assert_eq!(record.state, CalculationState::Ready);

        assert!(matches!(
            registry.find("ds", "total", Some("food_type")),
            Err(CalcError::CalculationNotFound)
        ));
        assert!(matches!(
            registry.find("missing", "total", None),
            Err(CalcError::CalculationNotFound)
        ));
    }

    #[test]
    fn test_delete_missing_combination() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store);

        let err = registry.delete("ds", "nope", None).unwrap_err();
        assert!(matches!(err, CalcError::CalculationNotFound));

        let err = registry.delete("missing_ds", "nope", None).unwrap_err();
        assert!(matches!(err, CalcError::CalculationNotFound));
    }

    #[test]
    fn test_deleting_last_grouped_calculation_drops_aggregate() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store.clone());

        registry
            .create("ds", "sum(amount)", "total", Some("food_type"))
            .unwrap();
        registry.delete("ds", "total", Some("food_type")).unwrap();

        let entry = store.find("ds").unwrap();
        let state = entry.read();
        assert!(state.dataset.aggregate("food_type").is_none());
    }

    #[test]
    fn test_name_slug_collision_resolved_against_schema() {
        let store = sample_store();
        let registry = CalculationRegistry::with_rhai(store.clone());

        // "Amount" slugs to "amount", which the schema already uses.
        registry.create("ds", "amount + 1", "Amount", None).unwrap();

        let entry = store.find("ds").unwrap();
        let state = entry.read();
        assert!(state.dataset.schema.contains("amount_"));
        assert_eq!(state.dataset.schema.get("amount_").unwrap().label, "Amount");
        // The original column is untouched.
        assert_eq!(
            state.dataset.column_values("amount"),
            vec![Value::Float(2.0), Value::Float(3.5), Value::Float(4.0)]
        );
    }
}
