//! Request-level surface over the calculation registry.
//!
//! Maps external calls onto the registry and formats results as JSON
//! payloads: successes as `{"success": message}`, failures as
//! `{"error": message}`. Errors never propagate past this layer; every
//! registry failure is a recoverable, human-readable payload.

use std::sync::Arc;

use serde_json::Map;

use calcframe_core::dataset::store::DatasetStore;
use calcframe_core::registry::CalculationRegistry;

/// Payload key for successful operations.
pub const SUCCESS: &str = "success";

/// Payload key for failed operations.
pub const ERROR: &str = "error";

/// A request to attach a calculation to a dataset.
#[derive(Debug, Clone)]
pub struct CreateCalculation {
    pub dataset_id: String,
    pub formula: String,
    pub name: String,
    /// Dimension column to group by, for aggregate calculations.
    pub group: Option<String>,
}

/// A request to remove a calculation from a dataset.
#[derive(Debug, Clone)]
pub struct DeleteCalculation {
    pub dataset_id: String,
    pub name: String,
    pub group: Option<String>,
}

/// The calculations API: create, delete and list calculations for datasets
/// held in a store.
pub struct CalculationsApi {
    registry: CalculationRegistry,
}

impl CalculationsApi {
    pub fn new(registry: CalculationRegistry) -> Self {
        CalculationsApi { registry }
    }

    /// API over a store with the default formula grammar.
    pub fn with_store(store: Arc<DatasetStore>) -> Self {
        Self::new(CalculationRegistry::with_rhai(store))
    }

    pub fn registry(&self) -> &CalculationRegistry {
        &self.registry
    }

    /// Add a calculation with the given formula to a dataset.
    pub fn create(&self, request: &CreateCalculation) -> serde_json::Value {
        let result = self.registry.create(
            &request.dataset_id,
            &request.formula,
            &request.name,
            request.group.as_deref(),
        );
        match result {
            Ok(record) => success(format!(
                "created calculation: {} for dataset: {}",
                record.name, request.dataset_id
            )),
            Err(e) => error(e.to_string()),
        }
    }

    /// Delete the calculation with `name` (and `group`, if aggregate) from a
    /// dataset, removing its column with it.
    pub fn delete(&self, request: &DeleteCalculation) -> serde_json::Value {
        let result = self.registry.delete(
            &request.dataset_id,
            &request.name,
            request.group.as_deref(),
        );
        match result {
            Ok(record) => success(format!(
                "deleted calculation: {} for dataset: {}",
                record.name, request.dataset_id
            )),
            Err(e) => error(e.to_string()),
        }
    }

    /// List a dataset's calculations as clean records.
    pub fn list(&self, dataset_id: &str) -> serde_json::Value {
        match self.registry.list(dataset_id) {
            Ok(records) => serde_json::to_value(records)
                .unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
            Err(e) => error(e.to_string()),
        }
    }
}

fn payload(key: &str, message: String) -> serde_json::Value {
    let mut object = Map::with_capacity(1);
    object.insert(key.to_string(), serde_json::Value::String(message));
    serde_json::Value::Object(object)
}

fn success(message: String) -> serde_json::Value {
    payload(SUCCESS, message)
}

fn error(message: String) -> serde_json::Value {
    payload(ERROR, message)
}
