//! calcframe-core - Dataset model, calculation registry and storage.

pub mod calculation;
pub mod dataset;
pub mod error;
pub mod registry;
pub mod storage;

pub use calculation::{Calculation, CalculationRecord, CalculationState};
pub use dataset::store::{DatasetEntry, DatasetState, DatasetStore};
pub use dataset::{ColumnRole, ColumnSchema, ColumnType, Dataset, Schema};
pub use error::{CalcError, Result};
pub use registry::CalculationRegistry;

pub use calcframe_engine::{FormulaEvaluator, Value};
