//! Predicate and statement rendering contracts.

use serde_json::json;
use studybridge::sql_builder::{FilterValue, SelectBuilder};

fn build_with_filter(data_type: &str, column: &str, filter: serde_json::Value) -> String {
    let mut builder = SelectBuilder::new("s.\"t\"", 1000).columns(["usubjid"]);
    builder
        .filter(column, data_type, &FilterValue::from_json(filter))
        .unwrap();
    builder.build().unwrap()
}

#[test]
fn in_operator_renders_quoted_list() {
    let sql = build_with_filter("text", "status", json!({"in": ["a", "b"]}));
    assert!(
        sql.contains("\"status\" IN ('a', 'b')"),
        "unexpected SQL: {sql}"
    );
}

#[test]
fn gt_on_numeric_column_renders_bare_comparison() {
    let sql = build_with_filter("integer", "age", json!({"gt": 30}));
    assert!(sql.contains("\"age\" > 30"), "unexpected SQL: {sql}");
    assert!(!sql.contains("CAST"), "numeric columns need no cast guard");
}

#[test]
fn gt_on_text_column_is_guarded_before_cast() {
    let sql = build_with_filter("character varying", "age", json!({"gt": 30}));
    assert!(sql.contains("match(\"age\""), "unexpected SQL: {sql}");
    assert!(
        sql.contains("CAST(\"age\" AS Float64) > 30"),
        "unexpected SQL: {sql}"
    );
    // The guard must precede the cast so non-numeric rows never reach it
    let guard_pos = sql.find("match(").unwrap();
    let cast_pos = sql.find("CAST(").unwrap();
    assert!(guard_pos < cast_pos);
}

#[test]
fn ilike_passes_pattern_through() {
    let sql = build_with_filter("text", "center", json!({"ilike": "%paris%"}));
    assert!(sql.contains("\"center\" ILIKE '%paris%'"), "unexpected SQL: {sql}");
}

#[test]
fn null_handling_for_not_and_is() {
    let sql = build_with_filter("text", "sex", json!({"not": null}));
    assert!(sql.contains("\"sex\" IS NOT NULL"));

    let sql = build_with_filter("boolean", "included", json!({"is": "true"}));
    assert!(sql.contains("\"included\" IS TRUE"));
}

#[test]
fn limit_is_always_present() {
    let sql = SelectBuilder::new("s.\"t\"", 250)
        .columns(["a"])
        .build()
        .unwrap();
    assert!(sql.ends_with("LIMIT 250"), "unexpected SQL: {sql}");
}

#[test]
fn scalar_in_value_is_a_build_error() {
    let mut builder = SelectBuilder::new("s.\"t\"", 10).columns(["a"]);
    let err = builder.filter("status", "text", &FilterValue::from_json(json!({"in": "a"})));
    assert!(err.is_err());
}
