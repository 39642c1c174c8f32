//! Typed filter predicate rendering.
//!
//! A filter is either a bare literal (equality) or an operator map:
//! `{"age": {"gt": 30}}`, `{"status": {"in": ["a", "b"]}}`. Predicates are
//! rendered against the *live* column type so that numeric comparisons on
//! text columns are guarded with a numeric-shape regex before the cast -
//! questionnaire text columns routinely mix digits with free text, and an
//! unguarded cast fails on the first non-numeric row.

use std::collections::BTreeMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::errors::SqlBuildError;
use super::quote_ident;

/// Pattern a text value must match before it is cast for numeric comparison.
pub const NUMERIC_SHAPE_PATTERN: &str = r"^[0-9]+(\.[0-9]+)?$";

lazy_static! {
    static ref NUMERIC_SHAPE: Regex = Regex::new(NUMERIC_SHAPE_PATTERN).unwrap();
}

/// One filter value: a bare literal (equality) or an operator map.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Literal(Value),
    Ops(BTreeMap<String, Value>),
}

impl FilterValue {
    /// Interpret a raw JSON filter value. Objects are operator maps,
    /// everything else is an equality literal.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => FilterValue::Ops(map.into_iter().collect()),
            other => FilterValue::Literal(other),
        }
    }
}

/// Supported comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    Ilike,
    In,
    Not,
    Is,
}

impl FilterOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "eq" => Some(FilterOp::Eq),
            "gt" => Some(FilterOp::Gt),
            "lt" => Some(FilterOp::Lt),
            "gte" => Some(FilterOp::Gte),
            "lte" => Some(FilterOp::Lte),
            "like" => Some(FilterOp::Like),
            "ilike" => Some(FilterOp::Ilike),
            "in" => Some(FilterOp::In),
            "not" => Some(FilterOp::Not),
            "is" => Some(FilterOp::Is),
            _ => None,
        }
    }

    fn comparison_symbol(self) -> Option<&'static str> {
        match self {
            FilterOp::Gt => Some(">"),
            FilterOp::Lt => Some("<"),
            FilterOp::Gte => Some(">="),
            FilterOp::Lte => Some("<="),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterOp::Eq => "eq",
            FilterOp::Gt => "gt",
            FilterOp::Lt => "lt",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
            FilterOp::Like => "like",
            FilterOp::Ilike => "ilike",
            FilterOp::In => "in",
            FilterOp::Not => "not",
            FilterOp::Is => "is",
        };
        f.write_str(s)
    }
}

/// Whether a live column type stores character data.
pub fn is_string_type(data_type: &str) -> bool {
    let lower = data_type.to_lowercase();
    lower.contains("char") || lower.contains("text") || lower.contains("string")
}

/// Whether a JSON value looks numeric (a number, or digit-shaped text).
fn is_numeric_value(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => NUMERIC_SHAPE.is_match(s),
        _ => false,
    }
}

/// Render a scalar as a bare SQL token (numbers unquoted, rest quoted).
fn bare_literal(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

/// Render a scalar as a single-quoted SQL string, doubling embedded quotes.
fn quoted_literal(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => bare_literal(other),
    };
    format!("'{}'", raw.replace('\'', "''"))
}

/// Literal rendering for equality-style comparisons: unquoted only when
/// both the column and the value are numeric.
fn equality_literal(value: &Value, column_is_string: bool) -> String {
    if !column_is_string && is_numeric_value(value) {
        bare_literal(value)
    } else {
        quoted_literal(value)
    }
}

/// Render all predicates for a single resolved filter.
pub fn render_filter(
    db_col: &str,
    data_type: &str,
    filter: &FilterValue,
) -> Result<Vec<String>, SqlBuildError> {
    match filter {
        FilterValue::Literal(value) => Ok(vec![format!(
            "{} = {}",
            quote_ident(db_col),
            equality_literal(value, is_string_type(data_type))
        )]),
        FilterValue::Ops(ops) => {
            let mut predicates = Vec::with_capacity(ops.len());
            for (op, value) in ops {
                let op = FilterOp::parse(op).ok_or_else(|| SqlBuildError::UnknownOperator {
                    op: op.clone(),
                    column: db_col.to_string(),
                })?;
                predicates.push(render_predicate(db_col, data_type, op, value)?);
            }
            Ok(predicates)
        }
    }
}

/// Render one `column op value` predicate against the live column type.
pub fn render_predicate(
    db_col: &str,
    data_type: &str,
    op: FilterOp,
    value: &Value,
) -> Result<String, SqlBuildError> {
    let col = quote_ident(db_col);
    let column_is_string = is_string_type(data_type);

    if let Some(symbol) = op.comparison_symbol() {
        if column_is_string && is_numeric_value(value) {
            // Guard the cast: only digit-shaped rows are compared numerically
            return Ok(format!(
                "match({col}, '{pattern}') AND CAST({col} AS Float64) {symbol} {value}",
                col = col,
                pattern = NUMERIC_SHAPE_PATTERN.replace('\\', "\\\\"),
                symbol = symbol,
                value = bare_literal(value),
            ));
        }
        if column_is_string {
            return Ok(format!("{} {} {}", col, symbol, quoted_literal(value)));
        }
        return Ok(format!("{} {} {}", col, symbol, bare_literal(value)));
    }

    match op {
        FilterOp::Eq => Ok(format!(
            "{} = {}",
            col,
            equality_literal(value, column_is_string)
        )),
        FilterOp::Like => Ok(format!("{} LIKE {}", col, quoted_literal(value))),
        FilterOp::Ilike => Ok(format!("{} ILIKE {}", col, quoted_literal(value))),
        FilterOp::In => {
            let Value::Array(items) = value else {
                return Err(SqlBuildError::InExpectsList {
                    column: db_col.to_string(),
                });
            };
            let rendered: Vec<String> = items.iter().map(quoted_literal).collect();
            Ok(format!("{} IN ({})", col, rendered.join(", ")))
        }
        FilterOp::Not => match value {
            Value::Null => Ok(format!("{} IS NOT NULL", col)),
            other => Ok(format!(
                "{} != {}",
                col,
                equality_literal(other, column_is_string)
            )),
        },
        FilterOp::Is => match value {
            Value::Null => Ok(format!("{} IS NULL", col)),
            other => {
                let text = bare_literal(other).to_lowercase();
                match text.as_str() {
                    "true" => Ok(format!("{} IS TRUE", col)),
                    "false" => Ok(format!("{} IS FALSE", col)),
                    _ => Ok(format!("{} IS NULL", col)),
                }
            }
        },
        // Comparison ops were handled above
        _ => unreachable!("comparison operators handled via comparison_symbol"),
    }
}
