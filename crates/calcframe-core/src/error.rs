//! Error types for the calcframe core.

use thiserror::Error;

use calcframe_engine::EvalError;

/// Errors that can occur while managing datasets and calculations.
///
/// All of these are local, recoverable failures: the calling surface converts
/// them into error payloads, none abort the process. Any failure during a
/// mutation leaves the dataset and registry unchanged.
#[derive(Error, Debug)]
pub enum CalcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV file is empty")]
    EmptyCsv,

    #[error("dataset_id not found")]
    DatasetNotFound,

    #[error("name and dataset_id combination not found")]
    CalculationNotFound,

    #[error("group {0} is not a dimension column")]
    InvalidGroup(String),

    #[error("calculation {0} already exists for this dataset")]
    DuplicateCalculation(String),

    #[error(transparent)]
    Formula(#[from] EvalError),
}

pub type Result<T> = std::result::Result<T, CalcError>;
