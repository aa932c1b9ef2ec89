//! calcframe_engine - Formula evaluation + Rhai integration.
//!
//! This crate owns the value primitives for tabular data and the formula
//! side of calcframe:
//!
//! - [`Value`], [`Row`], [`Table`] - Column value storage
//! - [`codec`] - Transport-safe JSON encoding of values
//! - [`FormulaEvaluator`] - Capability interface for pluggable formula grammars
//! - [`RhaiEvaluator`] - The Rhai-backed evaluator with aggregate builtins

pub(crate) mod builtins;
pub mod codec;
pub mod error;
pub mod eval;
pub mod refs;
pub mod value;

pub use error::{EvalError, Result};
pub use eval::{CompiledFormula, FormulaEvaluator, RhaiEvaluator};
pub use refs::extract_references;
pub use value::{Row, Table, Value};
