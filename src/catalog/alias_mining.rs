//! Mining of column aliases from SQL template files.
//!
//! Questionnaire exports ship with a SQL template whose SELECT list renames
//! warehouse expressions to catalog-facing columns (`lower(pat_code) AS
//! usubjid`). Those aliases are the only reliable bridge between catalog
//! names and live database names, so the loader scrapes them up front.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    // Plain identifier or call expression aliased with optional quoting.
    static ref ALIAS_SIMPLE: Regex = Regex::new(
        r#"(?i)(\w+(?:\([^)]*\))?)\s+AS\s+["']?([A-Za-z0-9_]+)["']?"#
    ).unwrap();
    // Wider net: any non-whitespace expression (casts, arithmetic) in front
    // of AS. The simple pattern wins when both match the same alias.
    static ref ALIAS_EXPR: Regex = Regex::new(
        r#"(?i)([^,\s]+(?:\([^)]*\))?)\s+AS\s+["']?([A-Za-z0-9_]+)["']?"#
    ).unwrap();
}

/// Extract `alias -> source expression` pairs from SQL template text.
/// Alias keys are lowercased; the first (most specific) match per alias wins.
pub fn mine_aliases(sql: &str) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();

    for caps in ALIAS_SIMPLE.captures_iter(sql) {
        aliases.insert(caps[2].to_lowercase(), caps[1].to_string());
    }
    for caps in ALIAS_EXPR.captures_iter(sql) {
        aliases
            .entry(caps[2].to_lowercase())
            .or_insert_with(|| caps[1].to_string());
    }

    aliases
}
