//! Built-in aggregate functions (Rust) and their metadata.
//!
//! Conventions:
//! - Formula-facing aggregate names are lower-case (e.g. `sum`, `mean`),
//!   matching column identifier casing.
//! - Aggregates take the full column of a group as an array; non-numeric and
//!   missing entries are skipped.
//! - If you add a new aggregate, update `AGGREGATE_BUILTINS` and register its
//!   implementation in `register_aggregates`.

use rhai::{Array, Dynamic, Engine};

pub struct AggregateBuiltin {
    pub name: &'static str,
    #[allow(dead_code)]
    pub description: &'static str,
}

pub const AGGREGATE_BUILTINS: &[AggregateBuiltin] = &[
    AggregateBuiltin {
        name: "sum",
        description: "Sum of numeric values in a column",
    },
    AggregateBuiltin {
        name: "mean",
        description: "Average of numeric values in a column",
    },
    AggregateBuiltin {
        name: "count",
        description: "Count of non-missing values in a column",
    },
    AggregateBuiltin {
        name: "min",
        description: "Minimum numeric value in a column",
    },
    AggregateBuiltin {
        name: "max",
        description: "Maximum numeric value in a column",
    },
];

fn numeric_values(values: &Array) -> impl Iterator<Item = f64> + '_ {
    values.iter().filter_map(dynamic_to_f64)
}

fn dynamic_to_f64(value: &Dynamic) -> Option<f64> {
    if let Ok(i) = value.as_int() {
        return Some(i as f64);
    }
    if let Ok(f) = value.as_float() {
        if f.is_nan() {
            return None;
        }
        return Some(f);
    }
    None
}

/// Register the aggregate builtins on a Rhai engine.
pub fn register_aggregates(engine: &mut Engine) {
    engine.register_fn("sum", |values: Array| -> f64 {
        numeric_values(&values).sum()
    });

    engine.register_fn("mean", |values: Array| -> f64 {
        let mut total = 0.0;
        let mut n = 0usize;
        for v in numeric_values(&values) {
            total += v;
            n += 1;
        }
        if n == 0 { f64::NAN } else { total / n as f64 }
    });

    engine.register_fn("count", |values: Array| -> i64 {
        values
            .iter()
            .filter(|v| {
                if v.is_unit() {
                    return false;
                }
                if let Ok(f) = v.as_float() {
                    return !f.is_nan();
                }
                true
            })
            .count() as i64
    });

    engine.register_fn("min", |values: Array| -> f64 {
        numeric_values(&values).fold(f64::NAN, |acc, v| if v < acc || acc.is_nan() { v } else { acc })
    });

    engine.register_fn("max", |values: Array| -> f64 {
        numeric_values(&values).fold(f64::NAN, |acc, v| if v > acc || acc.is_nan() { v } else { acc })
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        register_aggregates(&mut engine);
        engine
    }

    #[test]
    fn test_aggregates_over_arrays() {
        let engine = engine();
        let sum: f64 = engine.eval("sum([1, 2, 3.5])").unwrap();
        assert_eq!(sum, 6.5);

        let mean: f64 = engine.eval("mean([2, 4])").unwrap();
        assert_eq!(mean, 3.0);

        let count: i64 = engine.eval("count([1, (), \"x\"])").unwrap();
        assert_eq!(count, 2);

        let min: f64 = engine.eval("min([3, 1, 2])").unwrap();
        assert_eq!(min, 1.0);

        let max: f64 = engine.eval("max([3, 1, 2])").unwrap();
        assert_eq!(max, 3.0);
    }

    #[test]
    fn test_aggregates_skip_missing_entries() {
        let engine = engine();
        let sum: f64 = engine.eval("sum([1, (), 2])").unwrap();
        assert_eq!(sum, 3.0);

        let mean: f64 = engine.eval("mean([])").unwrap();
        assert!(mean.is_nan());
    }
}
