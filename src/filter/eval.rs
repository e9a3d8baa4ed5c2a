//! In-memory filter evaluation (the post-filter path).
//!
//! Evaluates a [`FilterExpr`] against a candidate's metadata map. Semantics
//! mirror the SQL lowering:
//!
//! - Missing fields: `!=` is `true`, every other operator is `false`.
//! - A numeric literal compares numerically when the metadata value parses
//!   as a number, and never matches otherwise.
//! - String and boolean literals compare as text (booleans
//!   case-insensitively).
//! - `LIKE` compiles `%` to `.*` and `_` to `.` as an anchored regex.

use std::collections::HashMap;

use super::ast::{CompareOp, FilterExpr, Value};

/// Evaluates `expr` against `metadata`.
#[must_use]
pub fn matches(expr: &FilterExpr, metadata: &HashMap<String, String>) -> bool {
    match expr {
        FilterExpr::And(children) => children.iter().all(|c| matches(c, metadata)),
        FilterExpr::Or(children) => children.iter().any(|c| matches(c, metadata)),
        FilterExpr::Not(child) => !matches(child, metadata),
        FilterExpr::Cmp { field, op, value } => {
            let Some(actual) = metadata.get(field) else {
                // Missing-field semantics.
                return *op == CompareOp::Ne;
            };
            compare(actual, *op, value)
        }
    }
}

fn compare(actual: &str, op: CompareOp, value: &Value) -> bool {
    match op {
        CompareOp::Eq => scalar_eq(actual, value),
        CompareOp::Ne => !scalar_eq(actual, value),
        CompareOp::Lt => ordering(actual, value).is_some_and(|o| o.is_lt()),
        CompareOp::Le => ordering(actual, value).is_some_and(|o| o.is_le()),
        CompareOp::Gt => ordering(actual, value).is_some_and(|o| o.is_gt()),
        CompareOp::Ge => ordering(actual, value).is_some_and(|o| o.is_ge()),
        CompareOp::In => match value {
            Value::List(items) => items.iter().any(|item| scalar_eq(actual, item)),
            _ => false,
        },
        CompareOp::Between => match value {
            Value::List(items) if items.len() == 2 => {
                let lo_ok = ordering(actual, &items[0]).is_some_and(|o| o.is_ge());
                let hi_ok = ordering(actual, &items[1]).is_some_and(|o| o.is_le());
                lo_ok && hi_ok
            }
            _ => false,
        },
        CompareOp::Like => match value {
            Value::Str(pattern) => like_match(actual, pattern),
            _ => false,
        },
        CompareOp::Regex => match value {
            Value::Str(pattern) => match regex::Regex::new(pattern) {
                Ok(re) => re.is_match(actual),
                Err(e) => {
                    log::debug!("ignoring invalid REGEX filter pattern {pattern:?}: {e}");
                    false
                }
            },
            _ => false,
        },
    }
}

/// Equality with coercion: numeric literal vs parseable metadata compares
/// numerically; booleans compare case-insensitively; everything else as text.
fn scalar_eq(actual: &str, value: &Value) -> bool {
    match value {
        Value::I64(_) | Value::F64(_) => match (actual.trim().parse::<f64>(), value.as_f64()) {
            (Ok(a), Some(b)) => a == b,
            _ => false,
        },
        Value::Bool(b) => actual.eq_ignore_ascii_case(if *b { "true" } else { "false" }),
        Value::Str(s) => actual == s,
        Value::List(_) => false,
    }
}

/// Ordering with the same coercion rules; `None` when incomparable.
fn ordering(actual: &str, value: &Value) -> Option<std::cmp::Ordering> {
    match value {
        Value::I64(_) | Value::F64(_) => {
            let a = actual.trim().parse::<f64>().ok()?;
            let b = value.as_f64()?;
            a.partial_cmp(&b)
        }
        Value::Str(s) => Some(actual.cmp(s.as_str())),
        Value::Bool(_) | Value::List(_) => None,
    }
}

/// SQL LIKE over a regex engine: `%` is any run, `_` any single character,
/// anchored at both ends. Regex metacharacters in the pattern are escaped.
fn like_match(actual: &str, pattern: &str) -> bool {
    let mut translated = String::with_capacity(pattern.len() + 2);
    translated.push('^');
    for c in pattern.chars() {
        match c {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => {
                if regex_meta(other) {
                    translated.push('\\');
                }
                translated.push(other);
            }
        }
    }
    translated.push('$');
    match regex::Regex::new(&translated) {
        Ok(re) => re.is_match(actual),
        Err(_) => false,
    }
}

fn regex_meta(c: char) -> bool {
    matches!(
        c,
        '.' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\'
    )
}
