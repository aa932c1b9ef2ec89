//! Calculation definitions and their externally visible records.

use serde::Serialize;

/// Lifecycle state of a calculation.
///
/// `Pending` exists between formula acceptance and column materialization;
/// since evaluation is synchronous it is never observable from the outside.
/// A calculation that fails validation or evaluation is discarded, not
/// persisted as `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationState {
    Pending,
    Ready,
    Failed,
}

/// A named, formula-derived column attached to a dataset, optionally scoped
/// to a group column.
#[derive(Debug, Clone)]
pub struct Calculation {
    pub name: String,
    pub formula: String,
    pub group: Option<String>,
    /// Column slug the computed values live under.
    pub target_slug: String,
    pub state: CalculationState,
}

impl Calculation {
    pub fn pending(
        name: impl Into<String>,
        formula: impl Into<String>,
        group: Option<String>,
        target_slug: impl Into<String>,
    ) -> Self {
        Calculation {
            name: name.into(),
            formula: formula.into(),
            group,
            target_slug: target_slug.into(),
            state: CalculationState::Pending,
        }
    }

    /// Whether this calculation matches a `(name, group)` lookup.
    pub fn matches(&self, name: &str, group: Option<&str>) -> bool {
        self.name == name && self.group.as_deref() == group
    }

    /// The externally visible projection: name, formula, group (when set)
    /// and state, with no internal identifiers.
    pub fn clean_record(&self) -> CalculationRecord {
        CalculationRecord {
            name: self.name.clone(),
            formula: self.formula.clone(),
            group: self.group.clone(),
            state: self.state,
        }
    }
}

/// The clean record exposed to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationRecord {
    pub name: String,
    pub formula: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub state: CalculationState,
}
