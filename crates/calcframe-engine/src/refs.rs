//! Column-reference extraction from formula strings.
//!
//! Parses formula text to find all column identifiers (e.g. `amount`,
//! `rating_1`) that the formula reads. This is what validation checks against
//! a dataset's schema, and what evaluation binds into the Rhai scope.
//!
//! Handles:
//! - Plain identifiers: `amount + 1`
//! - Ignores function calls: `sum(amount)` references only `amount`
//! - Ignores identifiers inside string literals

use regex::Regex;
use std::sync::OnceLock;

/// Rhai keywords and literals that can never be column references.
const RESERVED_WORDS: &[&str] = &[
    "if", "else", "true", "false", "let", "const", "fn", "in", "for", "while", "loop", "switch",
    "return", "break", "continue", "throw", "try", "catch", "this",
];

/// Extract all column references from a formula, deduplicated, in order of
/// first appearance.
pub fn extract_references(formula: &str) -> Vec<String> {
    // Ignore references inside string literals.
    let formula = strip_string_literals(formula);

    let mut refs: Vec<String> = Vec::new();
    for caps in ident_re().captures_iter(&formula) {
        let ident = &caps[1];
        if RESERVED_WORDS.contains(&ident) {
            continue;
        }
        // An identifier directly followed by `(` is a function call.
        if caps.get(2).is_some() {
            continue;
        }
        if !refs.iter().any(|r| r == ident) {
            refs.push(ident.to_string());
        }
    }
    refs
}

fn ident_re() -> &'static Regex {
    static IDENT_RE: OnceLock<Regex> = OnceLock::new();
    IDENT_RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*(\()?")
            .expect("column reference regex must compile")
    })
}

fn strip_string_literals(formula: &str) -> String {
    let mut out = String::with_capacity(formula.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in formula.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(' ');
                continue;
            }
            if ch == '\\' {
                escaped = true;
                out.push(' ');
                continue;
            }
            if ch == '"' {
                in_string = false;
                out.push('"');
            } else {
                out.push(' ');
            }
        } else if ch == '"' {
            in_string = true;
            out.push('"');
        } else {
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_references_empty() {
        assert!(extract_references("").is_empty());
        assert!(extract_references("10 + 20").is_empty());
    }

    #[test]
    fn test_extract_references_simple() {
        assert_eq!(extract_references("amount + 1"), vec!["amount"]);
        assert_eq!(
            extract_references("amount * rating_1"),
            vec!["amount", "rating_1"]
        );
    }

    #[test]
    fn test_extract_references_deduplicates() {
        assert_eq!(extract_references("amount + amount"), vec!["amount"]);
    }

    #[test]
    fn test_extract_references_skips_function_calls() {
        assert_eq!(extract_references("sum(amount)"), vec!["amount"]);
        assert_eq!(extract_references("mean (amount) + count(amount)"), vec!["amount"]);
    }

    #[test]
    fn test_extract_references_skips_keywords_and_strings() {
        assert_eq!(
            extract_references("if amount > 1 { amount } else { 0 }"),
            vec!["amount"]
        );
        assert_eq!(extract_references("name + \"amount\""), vec!["name"]);
    }
}
