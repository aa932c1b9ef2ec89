//! calcframe - Derived-column calculations over tabular datasets.
//!
//! A calculation attaches a named column to a dataset, computed by
//! evaluating a formula against the dataset's existing columns: row-wise,
//! or once per group of a dimension column for aggregate views. This crate
//! is the thin calling surface; the engine lives in `calcframe-core` and
//! `calcframe-engine`.

pub mod api;

pub use api::{CalculationsApi, CreateCalculation, DeleteCalculation, ERROR, SUCCESS};

pub use calcframe_core::dataset::store::DatasetStore;
pub use calcframe_core::registry::CalculationRegistry;
pub use calcframe_core::storage;
