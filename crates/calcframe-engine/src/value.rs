//! Column value storage.
//!
//! A dataset table is row-major: each [`Row`] maps a column slug to a
//! [`Value`]. Missing data is an explicit [`Value::Null`]; a float NaN is
//! treated as missing as well, matching the numeric stacks this data tends
//! to arrive from.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use rhai::Dynamic;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

/// One table row: column slug -> value.
pub type Row = HashMap<String, Value>;

/// Row-major table data.
pub type Table = Vec<Row>;

impl Value {
    /// Whether this value counts as missing data (no value, or float NaN).
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Canonical string form used for group keys. Values within one column
    /// share a type, so the plain display forms are unambiguous keys.
    pub fn key_string(&self) -> String {
        self.to_string()
    }

    /// Convert into a Rhai value for formula scopes.
    ///
    /// Dates are bound as ISO-8601 strings so formulas can compare and
    /// concatenate them without a Rhai-side date type.
    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            Value::Null => Dynamic::UNIT,
            Value::Bool(b) => Dynamic::from(*b),
            Value::Int(i) => Dynamic::from(*i),
            Value::Float(f) => Dynamic::from(*f),
            Value::Text(s) => Dynamic::from(s.clone()),
            Value::Date(d) => Dynamic::from(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Convert a Rhai evaluation result back into a column value.
    pub fn from_dynamic(value: Dynamic) -> Value {
        if value.is_unit() {
            return Value::Null;
        }
        if let Ok(b) = value.as_bool() {
            return Value::Bool(b);
        }
        if let Ok(i) = value.as_int() {
            return Value::Int(i);
        }
        if let Ok(f) = value.as_float() {
            return Value::Float(f);
        }
        if let Ok(s) = value.clone().into_string() {
            return Value::Text(s);
        }
        Value::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}
