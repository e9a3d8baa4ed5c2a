// The generated Rule enum has no docs of its own.
#![allow(missing_docs)]

//! pest-based filter parser.
//!
//! Builds a [`FilterExpr`] from the grammar in `filter.pest`. `AND` chains
//! bind tighter than `OR` chains and both flatten into n-ary nodes, so
//! `a = 1 AND b = 2 OR c = 3` parses as `(a = 1 AND b = 2) OR c = 3`.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::ast::{CompareOp, FilterExpr, Value};
use super::FilterError;

#[derive(Parser)]
#[grammar = "filter/filter.pest"]
struct FilterParser;

/// Parses a filter expression string.
///
/// # Errors
///
/// [`FilterError::Parse`] with the pest diagnostic for malformed input.
///
/// # Example
///
/// ```
/// use embervec::filter::parse;
///
/// let expr = parse("type = 'doc' AND score >= 0.5").unwrap();
/// assert_eq!(expr.to_string(), "type = 'doc' AND score >= 0.5");
/// ```
pub fn parse(input: &str) -> Result<FilterExpr, FilterError> {
    let mut pairs = FilterParser::parse(Rule::filter, input)
        .map_err(|e| FilterError::Parse(e.to_string()))?;
    let filter = pairs.next().ok_or_else(|| {
        FilterError::Parse("empty parse result".into())
    })?;
    let expr_pair = filter
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| FilterError::Parse("missing expression".into()))?;
    build_or(expr_pair)
}

fn build_or(pair: Pair<'_, Rule>) -> Result<FilterExpr, FilterError> {
    let mut children = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::and_expr => children.push(build_and(inner)?),
            Rule::or_op => {}
            other => return Err(unexpected(other)),
        }
    }
    collapse(children, FilterExpr::Or)
}

fn build_and(pair: Pair<'_, Rule>) -> Result<FilterExpr, FilterError> {
    let mut children = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::not_expr => children.push(build_not(inner)?),
            Rule::and_op => {}
            other => return Err(unexpected(other)),
        }
    }
    collapse(children, FilterExpr::And)
}

fn build_not(pair: Pair<'_, Rule>) -> Result<FilterExpr, FilterError> {
    let mut negated = false;
    let mut result = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::not_op => negated = true,
            Rule::not_expr => result = Some(build_not(inner)?),
            Rule::expr => result = Some(build_or(inner)?),
            Rule::comparison => result = Some(build_comparison(inner)?),
            other => return Err(unexpected(other)),
        }
    }
    let expr = result.ok_or_else(|| FilterError::Parse("empty NOT operand".into()))?;
    Ok(if negated {
        FilterExpr::Not(Box::new(expr))
    } else {
        expr
    })
}

fn build_comparison(pair: Pair<'_, Rule>) -> Result<FilterExpr, FilterError> {
    let mut inner = pair.into_inner();
    let field = inner
        .next()
        .ok_or_else(|| FilterError::Parse("comparison missing field".into()))?
        .as_str()
        .to_string();
    let pred = inner
        .next()
        .ok_or_else(|| FilterError::Parse("comparison missing predicate".into()))?;

    match pred.as_rule() {
        Rule::between_pred => {
            let mut values = Vec::new();
            for p in pred.into_inner() {
                match p.as_rule() {
                    Rule::and_op => {}
                    _ => values.push(build_value(p)?),
                }
            }
            if values.len() != 2 {
                return Err(FilterError::Parse("BETWEEN requires two bounds".into()));
            }
            let hi = values.pop().expect("two values");
            let lo = values.pop().expect("two values");
            Ok(FilterExpr::between(field, lo, hi))
        }
        Rule::in_pred => {
            let mut items = Vec::new();
            for p in pred.into_inner() {
                items.push(build_value(p)?);
            }
            if items.is_empty() {
                return Err(FilterError::Parse("IN requires at least one item".into()));
            }
            Ok(FilterExpr::is_in(field, items))
        }
        Rule::binary_pred => {
            let mut parts = pred.into_inner();
            let op_pair = parts
                .next()
                .ok_or_else(|| FilterError::Parse("missing operator".into()))?;
            let op = match op_pair.as_str() {
                "=" => CompareOp::Eq,
                "!=" => CompareOp::Ne,
                "<" => CompareOp::Lt,
                "<=" => CompareOp::Le,
                ">" => CompareOp::Gt,
                ">=" => CompareOp::Ge,
                "LIKE" => CompareOp::Like,
                "REGEX" => CompareOp::Regex,
                other => return Err(FilterError::Parse(format!("unknown operator {other}"))),
            };
            let value_pair = parts
                .next()
                .ok_or_else(|| FilterError::Parse("missing value".into()))?;
            Ok(FilterExpr::Cmp {
                field,
                op,
                value: build_value(value_pair)?,
            })
        }
        other => Err(unexpected(other)),
    }
}

fn build_value(pair: Pair<'_, Rule>) -> Result<Value, FilterError> {
    match pair.as_rule() {
        Rule::string_sq | Rule::string_dq => Ok(Value::Str(unescape(pair.as_str()))),
        Rule::boolean => Ok(Value::Bool(pair.as_str().eq_ignore_ascii_case("true"))),
        Rule::number => {
            let text = pair.as_str();
            if text.contains('.') || text.contains('e') || text.contains('E') {
                text.parse::<f64>()
                    .map(Value::F64)
                    .map_err(|_| FilterError::Parse(format!("bad float literal {text}")))
            } else {
                text.parse::<i64>()
                    .map(Value::I64)
                    .map_err(|_| FilterError::Parse(format!("bad integer literal {text}")))
            }
        }
        Rule::bare => Ok(Value::Str(pair.as_str().to_string())),
        other => Err(unexpected(other)),
    }
}

/// Strips the surrounding quotes and processes backslash escapes.
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn collapse(
    mut children: Vec<FilterExpr>,
    combinator: fn(Vec<FilterExpr>) -> FilterExpr,
) -> Result<FilterExpr, FilterError> {
    match children.len() {
        0 => Err(FilterError::Parse("empty expression".into())),
        1 => Ok(children.pop().expect("one child")),
        _ => Ok(combinator(children)),
    }
}

fn unexpected(rule: Rule) -> FilterError {
    FilterError::Parse(format!("unexpected grammar rule {rule:?}"))
}
