//! Lowering filter expressions to predicate SQL (the pre-filter path).
//!
//! Produces a parameterized clause over the `e`-aliased embeddings table,
//! extracting metadata fields with `json_extract(e.metadata, '$.field')`.
//! A bound-parameter counter is threaded through the recursion so `?N`
//! placeholders are numbered in emission order.
//!
//! Numeric operators compare through `embervec_real(...)`, a scalar function
//! the store registers on every connection. It applies the same strict `f64`
//! parse as the in-memory evaluator and yields NULL for anything that does
//! not parse in full — SQLite's bare CAST is lenient (`CAST('42abc' AS
//! REAL)` is `42.0`) and would admit rows the post-filter rejects. String
//! operators compare text; booleans compare lowercased text; `LIKE` uses SQL
//! wildcards directly; `IN` binds one parameter per element. `REGEX` and
//! mixed-type `IN` lists have no SQL form: lowering is all-or-nothing, so
//! the planner demotes the entire filter to a post-filter on
//! [`FilterError::Unlowerable`].

use super::ast::{CompareOp, FilterExpr, Value};
use super::FilterError;

/// A bound SQL parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    /// Bound as TEXT.
    Text(String),
    /// Bound as REAL.
    Real(f64),
}

/// A lowered predicate: clause text plus parameters in emission order.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlPredicate {
    /// Clause referencing the `e` embeddings alias, parenthesized.
    pub clause: String,
    /// Parameters for `?N` placeholders, in numbering order.
    pub params: Vec<SqlParam>,
}

/// Lowers `expr` to predicate SQL starting the parameter counter at
/// `first_param` (1-based; pass the count of parameters already bound by the
/// surrounding query plus one).
///
/// # Errors
///
/// [`FilterError::Unlowerable`] when any subexpression has no SQL form.
pub fn lower(expr: &FilterExpr, first_param: usize) -> Result<SqlPredicate, FilterError> {
    let mut counter = first_param;
    let mut params = Vec::new();
    let clause = lower_expr(expr, &mut counter, &mut params)?;
    Ok(SqlPredicate { clause, params })
}

fn lower_expr(
    expr: &FilterExpr,
    counter: &mut usize,
    params: &mut Vec<SqlParam>,
) -> Result<String, FilterError> {
    match expr {
        FilterExpr::And(children) => lower_variadic(children, " AND ", counter, params),
        FilterExpr::Or(children) => lower_variadic(children, " OR ", counter, params),
        FilterExpr::Not(child) => {
            let inner = lower_expr(child, counter, params)?;
            Ok(format!("(NOT {inner})"))
        }
        FilterExpr::Cmp { field, op, value } => lower_cmp(field, *op, value, counter, params),
    }
}

fn lower_variadic(
    children: &[FilterExpr],
    joiner: &str,
    counter: &mut usize,
    params: &mut Vec<SqlParam>,
) -> Result<String, FilterError> {
    if children.is_empty() {
        return Err(FilterError::Unlowerable("empty AND/OR".into()));
    }
    let mut parts = Vec::with_capacity(children.len());
    for child in children {
        parts.push(lower_expr(child, counter, params)?);
    }
    Ok(format!("({})", parts.join(joiner)))
}

fn lower_cmp(
    field: &str,
    op: CompareOp,
    value: &Value,
    counter: &mut usize,
    params: &mut Vec<SqlParam>,
) -> Result<String, FilterError> {
    let extract = extract_expr(field)?;

    match op {
        CompareOp::Eq | CompareOp::Ne => {
            let operator = if op == CompareOp::Eq { "=" } else { "<>" };
            let (lhs, param) = comparable(&extract, value)?;
            let placeholder = bind(param, counter, params);
            if op == CompareOp::Ne {
                // A missing field satisfies !=, matching the post-filter;
                // so does a non-numeric value under a numeric literal
                // (embervec_real yields NULL for it).
                if value.is_numeric() {
                    Ok(format!(
                        "({extract} IS NULL OR {lhs} IS NULL OR {lhs} {operator} {placeholder})"
                    ))
                } else {
                    Ok(format!(
                        "({extract} IS NULL OR {lhs} {operator} {placeholder})"
                    ))
                }
            } else {
                Ok(format!("({lhs} {operator} {placeholder})"))
            }
        }
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let operator = match op {
                CompareOp::Lt => "<",
                CompareOp::Le => "<=",
                CompareOp::Gt => ">",
                _ => ">=",
            };
            let (lhs, param) = comparable(&extract, value)?;
            let placeholder = bind(param, counter, params);
            Ok(format!("({lhs} {operator} {placeholder})"))
        }
        CompareOp::Between => {
            let Value::List(items) = value else {
                return Err(FilterError::Unlowerable("BETWEEN without a range".into()));
            };
            if items.len() != 2 {
                return Err(FilterError::Unlowerable(
                    "BETWEEN requires two bounds".into(),
                ));
            }
            let (lhs_lo, lo) = comparable(&extract, &items[0])?;
            let (lhs_hi, hi) = comparable(&extract, &items[1])?;
            if lhs_lo != lhs_hi {
                return Err(FilterError::Unlowerable(
                    "BETWEEN bounds of mixed types".into(),
                ));
            }
            let p_lo = bind(lo, counter, params);
            let p_hi = bind(hi, counter, params);
            Ok(format!("({lhs_lo} BETWEEN {p_lo} AND {p_hi})"))
        }
        CompareOp::In => {
            let Value::List(items) = value else {
                return Err(FilterError::Unlowerable("IN without a list".into()));
            };
            if items.is_empty() {
                return Err(FilterError::Unlowerable("IN with an empty list".into()));
            }
            let all_numeric = items.iter().all(Value::is_numeric);
            let all_text = items.iter().all(|v| matches!(v, Value::Str(_)));
            if !all_numeric && !all_text {
                return Err(FilterError::Unlowerable(
                    "IN list mixes numeric and text elements".into(),
                ));
            }
            let lhs = if all_numeric {
                format!("embervec_real({extract})")
            } else {
                extract.clone()
            };
            let mut placeholders = Vec::with_capacity(items.len());
            for item in items {
                let param = if all_numeric {
                    SqlParam::Real(item.as_f64().expect("numeric element"))
                } else {
                    SqlParam::Text(item.as_text())
                };
                placeholders.push(bind(param, counter, params));
            }
            Ok(format!("({lhs} IN ({}))", placeholders.join(", ")))
        }
        CompareOp::Like => {
            let Value::Str(pattern) = value else {
                return Err(FilterError::Unlowerable(
                    "LIKE requires a string pattern".into(),
                ));
            };
            let placeholder = bind(SqlParam::Text(pattern.clone()), counter, params);
            Ok(format!("({extract} LIKE {placeholder})"))
        }
        CompareOp::Regex => Err(FilterError::Unlowerable(
            "REGEX has no SQL form".into(),
        )),
    }
}

/// Left-hand side and parameter for a scalar comparison, picking the numeric
/// or text coercion. Numeric coercion goes through the registered strict
/// parse so a value like `"42abc"` stays NULL instead of casting to `42.0`.
fn comparable(extract: &str, value: &Value) -> Result<(String, SqlParam), FilterError> {
    match value {
        Value::I64(_) | Value::F64(_) => Ok((
            format!("embervec_real({extract})"),
            SqlParam::Real(value.as_f64().expect("numeric value")),
        )),
        Value::Str(s) => Ok((extract.to_string(), SqlParam::Text(s.clone()))),
        Value::Bool(b) => Ok((
            format!("lower({extract})"),
            SqlParam::Text(b.to_string()),
        )),
        Value::List(_) => Err(FilterError::Unlowerable(
            "list operand outside IN/BETWEEN".into(),
        )),
    }
}

fn bind(param: SqlParam, counter: &mut usize, params: &mut Vec<SqlParam>) -> String {
    let placeholder = format!("?{counter}");
    *counter += 1;
    params.push(param);
    placeholder
}

/// Builds the JSON-path extraction for a metadata field, rejecting names that
/// cannot be spliced into a path literal safely. The key is quoted in the
/// path so dotted field names address the flat metadata key, matching the
/// in-memory evaluator.
fn extract_expr(field: &str) -> Result<String, FilterError> {
    if field.is_empty()
        || !field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(FilterError::Unlowerable(format!(
            "field name {field:?} is not a safe JSON path"
        )));
    }
    Ok(format!("json_extract(e.metadata, '$.\"{field}\"')"))
}
