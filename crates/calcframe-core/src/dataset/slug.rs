//! Storage-safe column keys ("slugs") derived from display labels.
//!
//! Labels can contain anything a user types into a column header: spaces,
//! operators, punctuation. Storage keys cannot, and the formula grammar needs
//! plain identifiers, so every run of non-alphanumeric characters collapses
//! to a single underscore and the result is lower-cased. Keys reserved by the
//! document store are mapped to a fixed prefixed form instead, so they can
//! never collide with storage internals.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use super::Schema;

/// Keys the document store reserves for itself (the internal row-id key).
pub const RESERVED_KEYS: &[&str] = &["_id"];

/// Prefix applied to reserved keys instead of character substitution.
pub const RESERVED_KEY_PREFIX: &str = "reserved_";

fn encode_column_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").expect("column encoding regex must compile"))
}

/// Prefix a storage-reserved key.
pub fn prefix_reserved_key(key: &str) -> String {
    format!("{}{}", RESERVED_KEY_PREFIX, key)
}

/// Convert column labels into unique storage slugs, order-preserving.
///
/// Deterministic: the same input sequence always yields the same output
/// sequence. Collisions within the call are resolved by appending
/// underscores until unique.
pub fn slugify_columns(labels: &[String]) -> Vec<String> {
    let mut slugs: Vec<String> = Vec::with_capacity(labels.len());

    for label in labels {
        let mut slug = if RESERVED_KEYS.contains(&label.as_str()) {
            prefix_reserved_key(label)
        } else {
            encode_column_re()
                .replace_all(label, "_")
                .to_lowercase()
        };
        while slugs.iter().any(|s| s == &slug) {
            slug.push('_');
        }
        slugs.push(slug);
    }

    slugs
}

/// Derive a slug for one new label, unique against the slugs already in use.
pub fn unique_slug<'a, I>(label: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let taken: Vec<&String> = existing.into_iter().collect();
    let mut slug = if RESERVED_KEYS.contains(&label) {
        prefix_reserved_key(label)
    } else {
        encode_column_re().replace_all(label, "_").to_lowercase()
    };
    while taken.iter().any(|s| *s == &slug) {
        slug.push('_');
    }
    slug
}

/// Map column labels back to their slugs.
///
/// Callable any time a schema exists, not only at dataset creation.
pub fn labels_to_slugs(schema: &Schema) -> HashMap<String, String> {
    schema
        .iter()
        .map(|(slug, column)| (column.label.clone(), slug.clone()))
        .collect()
}
