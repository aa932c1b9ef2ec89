//! Formula validation and evaluation.
//!
//! Formulas are a pluggable capability behind [`FormulaEvaluator`]: the
//! registry only asks for validate / evaluate / evaluate-grouped and never
//! sees the grammar. [`RhaiEvaluator`] is the concrete implementation,
//! binding column values into a Rhai scope per row (or per group, as arrays)
//! and evaluating the compiled expression.

use std::collections::HashSet;

use rhai::{AST, Dynamic, Engine, Scope};

use crate::builtins::register_aggregates;
use crate::error::{EvalError, Result};
use crate::refs::extract_references;
use crate::value::{Row, Value};

/// A validated formula, ready to evaluate.
///
/// Opaque to callers: the registry stores it between validation and
/// evaluation but never looks inside.
#[derive(Debug)]
pub struct CompiledFormula {
    source: String,
    ast: AST,
    references: Vec<String>,
}

impl CompiledFormula {
    /// The original formula text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Column slugs the formula reads.
    pub fn references(&self) -> &[String] {
        &self.references
    }
}

/// Capability interface over a formula grammar.
pub trait FormulaEvaluator: Send + Sync {
    /// Parse `formula` and check every column reference against `allowed`.
    fn validate(&self, formula: &str, allowed: &HashSet<String>) -> Result<CompiledFormula>;

    /// Evaluate row-wise: one result value per table row, in row order.
    fn evaluate(&self, formula: &CompiledFormula, table: &[Row]) -> Result<Vec<Value>>;

    /// Evaluate once per distinct group key, with each referenced column
    /// bound as the array of its values within the group. Returns
    /// `(group value, result)` pairs ordered by first appearance of the key.
    fn evaluate_grouped(
        &self,
        formula: &CompiledFormula,
        table: &[Row],
        group: &str,
    ) -> Result<Vec<(Value, Value)>>;
}

/// Rhai-backed formula evaluator with aggregate builtins registered.
pub struct RhaiEvaluator {
    engine: Engine,
}

impl RhaiEvaluator {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        register_aggregates(&mut engine);
        RhaiEvaluator { engine }
    }

    fn eval_scope(&self, ast: &AST, scope: &mut Scope) -> Value {
        // A fault on one row (e.g. arithmetic on a missing operand bound as
        // unit) yields a missing value for that row rather than failing the
        // whole column.
        match self.engine.eval_ast_with_scope::<Dynamic>(scope, ast) {
            Ok(result) => Value::from_dynamic(result),
            Err(_) => Value::Null,
        }
    }
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaEvaluator for RhaiEvaluator {
    fn validate(&self, formula: &str, allowed: &HashSet<String>) -> Result<CompiledFormula> {
        let references = extract_references(formula);
        for reference in &references {
            if !allowed.contains(reference.as_str()) {
                return Err(EvalError::UnknownColumn(reference.clone()));
            }
        }

        let ast = self
            .engine
            .compile_expression(formula)
            .map_err(|e| EvalError::Parse(e.to_string()))?;

        Ok(CompiledFormula {
            source: formula.to_string(),
            ast,
            references,
        })
    }

    fn evaluate(&self, formula: &CompiledFormula, table: &[Row]) -> Result<Vec<Value>> {
        let mut results = Vec::with_capacity(table.len());
        for row in table {
            let mut scope = Scope::new();
            for reference in formula.references() {
                let value = row.get(reference).cloned().unwrap_or(Value::Null);
                scope.push_dynamic(reference.as_str(), value.to_dynamic());
            }
            results.push(self.eval_scope(&formula.ast, &mut scope));
        }
        Ok(results)
    }

    fn evaluate_grouped(
        &self,
        formula: &CompiledFormula,
        table: &[Row],
        group: &str,
    ) -> Result<Vec<(Value, Value)>> {
        let mut results = Vec::new();
        for (key, rows) in group_rows(table, group) {
            let mut scope = Scope::new();
            for reference in formula.references() {
                let column: rhai::Array = rows
                    .iter()
                    .map(|row| {
                        row.get(reference)
                            .cloned()
                            .unwrap_or(Value::Null)
                            .to_dynamic()
                    })
                    .collect();
                scope.push_dynamic(reference.as_str(), Dynamic::from_array(column));
            }
            results.push((key, self.eval_scope(&formula.ast, &mut scope)));
        }
        Ok(results)
    }
}

/// Partition table rows by the group column, preserving first-appearance
/// order of keys. Rows with a missing group value are skipped.
fn group_rows<'a>(table: &'a [Row], group: &str) -> Vec<(Value, Vec<&'a Row>)> {
    let mut groups: Vec<(Value, Vec<&'a Row>)> = Vec::new();
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for row in table {
        let Some(key) = row.get(group) else { continue };
        if key.is_missing() {
            continue;
        }
        match index.get(&key.key_string()) {
            Some(&i) => groups[i].1.push(row),
            None => {
                index.insert(key.key_string(), groups.len());
                groups.push((key.clone(), vec![row]));
            }
        }
    }

    groups
}
