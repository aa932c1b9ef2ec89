//! In-memory dataset store with per-dataset concurrency control.
//!
//! The store is a concurrent map from dataset id to an entry holding the
//! dataset and its calculations. Each entry serializes schema-mutating
//! operations through a write gate while readers take a shared snapshot
//! lock; a reader never observes a half-committed mutation.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;

use crate::calculation::Calculation;
use crate::dataset::Dataset;
use crate::error::{CalcError, Result};

/// A dataset together with its calculation definitions. Readers see both or
/// neither side of any mutation.
#[derive(Debug)]
pub struct DatasetState {
    pub dataset: Dataset,
    pub calculations: Vec<Calculation>,
}

/// Store entry for one dataset.
///
/// `write_gate` serializes mutations (calculation create/delete) so that
/// evaluation can run outside the `state` lock without a competing writer
/// changing the table underneath it. Readers only ever take `state.read()`.
pub struct DatasetEntry {
    state: RwLock<DatasetState>,
    write_gate: Mutex<()>,
}

impl DatasetEntry {
    fn new(dataset: Dataset) -> Self {
        DatasetEntry {
            state: RwLock::new(DatasetState {
                dataset,
                calculations: Vec::new(),
            }),
            write_gate: Mutex::new(()),
        }
    }

    /// Shared snapshot access.
    pub fn read(&self) -> RwLockReadGuard<'_, DatasetState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Exclusive access for committing a mutation. Hold the write gate first.
    pub fn write(&self) -> RwLockWriteGuard<'_, DatasetState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Serialize schema-mutating operations on this dataset.
    pub fn lock_writes(&self) -> MutexGuard<'_, ()> {
        match self.write_gate.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Concurrent map of datasets by id.
#[derive(Default)]
pub struct DatasetStore {
    datasets: DashMap<String, Arc<DatasetEntry>>,
}

impl DatasetStore {
    pub fn new() -> Self {
        DatasetStore::default()
    }

    /// Register a dataset under an id, replacing any previous dataset with
    /// the same id (and its calculations).
    pub fn insert(&self, dataset_id: impl Into<String>, dataset: Dataset) {
        self.datasets
            .insert(dataset_id.into(), Arc::new(DatasetEntry::new(dataset)));
    }

    /// Look up a dataset entry.
    pub fn find(&self, dataset_id: &str) -> Result<Arc<DatasetEntry>> {
        self.datasets
            .get(dataset_id)
            .map(|entry| entry.value().clone())
            .ok_or(CalcError::DatasetNotFound)
    }

    /// Remove a dataset and everything it owns.
    pub fn remove(&self, dataset_id: &str) -> bool {
        self.datasets.remove(dataset_id).is_some()
    }

    pub fn contains(&self, dataset_id: &str) -> bool {
        self.datasets.contains_key(dataset_id)
    }
}
