//! Error types for formula evaluation.

use thiserror::Error;

use rhai::EvalAltResult;

/// Errors produced while validating or evaluating a formula.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown column reference: {0}")]
    UnknownColumn(String),

    #[error("Rhai error: {0}")]
    Rhai(
        #[from]
        #[source]
        Box<EvalAltResult>,
    ),
}

pub type Result<T> = std::result::Result<T, EvalError>;
