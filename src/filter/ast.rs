//! Filter AST: tagged literal values, comparison leaves, logical combinators.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::FilterError;

/// A literal value in a comparison leaf.
///
/// Comparison-time coercion: numeric literal against a metadata value that
/// parses as a number compares numerically; anything else compares as text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// String literal.
    Str(String),
    /// Integer literal.
    I64(i64),
    /// Float literal.
    F64(f64),
    /// Boolean literal.
    Bool(bool),
    /// List literal, used by `IN` and `BETWEEN`.
    List(Vec<Value>),
}

impl Value {
    /// Whether this is a numeric scalar.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::I64(_) | Value::F64(_))
    }

    /// Numeric view of the scalar, if it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(i) => Some(*i as f64),
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Text view used for string-coerced comparisons.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::I64(i) => i.to_string(),
            Value::F64(f) => format!("{f:?}"),
            Value::Bool(b) => b.to_string(),
            Value::List(_) => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => {
                write!(f, "'")?;
                for c in s.chars() {
                    match c {
                        '\'' => write!(f, "\\'")?,
                        '\\' => write!(f, "\\\\")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "'")
            }
            Value::I64(i) => write!(f, "{i}"),
            // Debug formatting keeps the decimal point so the value
            // re-parses as a float.
            Value::F64(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Comparison operators on a metadata field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `IN (…)` — non-empty list membership.
    In,
    /// `BETWEEN lo AND hi` — two-element ordered range, inclusive.
    Between,
    /// `LIKE` — SQL wildcards (`%`, `_`), compiled to an anchored regex for
    /// in-memory evaluation.
    Like,
    /// `REGEX` — in-memory only; never lowered to SQL.
    Regex,
}

impl CompareOp {
    /// Canonical token for rendering.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::In => "IN",
            CompareOp::Between => "BETWEEN",
            CompareOp::Like => "LIKE",
            CompareOp::Regex => "REGEX",
        }
    }
}

/// A filter expression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    /// Conjunction; at least one child.
    And(Vec<FilterExpr>),
    /// Disjunction; at least one child.
    Or(Vec<FilterExpr>),
    /// Negation; exactly one child.
    Not(Box<FilterExpr>),
    /// Comparison leaf.
    Cmp {
        /// Metadata field name.
        field: String,
        /// Operator.
        op: CompareOp,
        /// Literal operand.
        value: Value,
    },
}

impl FilterExpr {
    /// `field = value`
    #[must_use]
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::Eq,
            value,
        }
    }

    /// `field != value`
    #[must_use]
    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::Ne,
            value,
        }
    }

    /// `field < value`
    #[must_use]
    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::Lt,
            value,
        }
    }

    /// `field <= value`
    #[must_use]
    pub fn le(field: impl Into<String>, value: Value) -> Self {
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::Le,
            value,
        }
    }

    /// `field > value`
    #[must_use]
    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::Gt,
            value,
        }
    }

    /// `field >= value`
    #[must_use]
    pub fn ge(field: impl Into<String>, value: Value) -> Self {
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::Ge,
            value,
        }
    }

    /// `field LIKE pattern`
    #[must_use]
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::Like,
            value: Value::Str(pattern.into()),
        }
    }

    /// `field REGEX pattern`
    #[must_use]
    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::Regex,
            value: Value::Str(pattern.into()),
        }
    }

    /// `field IN (items…)`
    #[must_use]
    pub fn is_in(field: impl Into<String>, items: Vec<Value>) -> Self {
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::In,
            value: Value::List(items),
        }
    }

    /// `field BETWEEN lo AND hi`. Numeric bounds are reordered so the range
    /// is always ascending.
    #[must_use]
    pub fn between(field: impl Into<String>, lo: Value, hi: Value) -> Self {
        let (lo, hi) = match (lo.as_f64(), hi.as_f64()) {
            (Some(a), Some(b)) if a > b => (hi, lo),
            _ => (lo, hi),
        };
        FilterExpr::Cmp {
            field: field.into(),
            op: CompareOp::Between,
            value: Value::List(vec![lo, hi]),
        }
    }

    /// Conjunction of `children`.
    #[must_use]
    pub fn and(children: Vec<FilterExpr>) -> Self {
        FilterExpr::And(children)
    }

    /// Disjunction of `children`.
    #[must_use]
    pub fn or(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Or(children)
    }

    /// Negation of `child`.
    #[must_use]
    pub fn not(child: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(child))
    }

    /// Checks the structural invariants: `AND`/`OR` carry at least one
    /// child, `BETWEEN` a two-element list, `IN` a non-empty list.
    ///
    /// # Errors
    ///
    /// [`FilterError::Invalid`] naming the violated invariant.
    pub fn validate(&self) -> Result<(), FilterError> {
        match self {
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                if children.is_empty() {
                    return Err(FilterError::Invalid(
                        "AND/OR requires at least one child".into(),
                    ));
                }
                for c in children {
                    c.validate()?;
                }
                Ok(())
            }
            FilterExpr::Not(child) => child.validate(),
            FilterExpr::Cmp { op, value, .. } => match op {
                CompareOp::Between => match value {
                    Value::List(items) if items.len() == 2 => Ok(()),
                    _ => Err(FilterError::Invalid(
                        "BETWEEN requires a two-element range".into(),
                    )),
                },
                CompareOp::In => match value {
                    Value::List(items) if !items.is_empty() => Ok(()),
                    _ => Err(FilterError::Invalid("IN requires a non-empty list".into())),
                },
                _ => match value {
                    Value::List(_) => Err(FilterError::Invalid(format!(
                        "{} does not take a list operand",
                        op.token()
                    ))),
                    _ => Ok(()),
                },
            },
        }
    }

    /// Renders a child, parenthesizing combinators so precedence survives a
    /// round-trip.
    fn fmt_child(child: &FilterExpr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match child {
            FilterExpr::And(_) | FilterExpr::Or(_) => write!(f, "({child})"),
            _ => write!(f, "{child}"),
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::And(children) => {
                if children.len() == 1 {
                    return write!(f, "{}", children[0]);
                }
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    Self::fmt_child(c, f)?;
                }
                Ok(())
            }
            FilterExpr::Or(children) => {
                if children.len() == 1 {
                    return write!(f, "{}", children[0]);
                }
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    Self::fmt_child(c, f)?;
                }
                Ok(())
            }
            FilterExpr::Not(child) => {
                write!(f, "NOT (")?;
                write!(f, "{child}")?;
                write!(f, ")")
            }
            FilterExpr::Cmp { field, op, value } => match op {
                CompareOp::Between => match value {
                    Value::List(items) if items.len() == 2 => {
                        write!(f, "{field} BETWEEN {} AND {}", items[0], items[1])
                    }
                    _ => write!(f, "{field} BETWEEN <invalid>"),
                },
                CompareOp::In => write!(f, "{field} IN {value}"),
                _ => write!(f, "{field} {} {value}", op.token()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_simple_comparison() {
        let e = FilterExpr::eq("type", Value::Str("doc".into()));
        assert_eq!(e.to_string(), "type = 'doc'");
    }

    #[test]
    fn render_preserves_precedence_with_parens() {
        let e = FilterExpr::or(vec![
            FilterExpr::and(vec![
                FilterExpr::eq("a", Value::I64(1)),
                FilterExpr::eq("b", Value::I64(2)),
            ]),
            FilterExpr::eq("c", Value::I64(3)),
        ]);
        assert_eq!(e.to_string(), "(a = 1 AND b = 2) OR c = 3");
    }

    #[test]
    fn render_float_keeps_decimal_point() {
        let e = FilterExpr::gt("score", Value::F64(1.0));
        assert_eq!(e.to_string(), "score > 1.0");
    }

    #[test]
    fn render_between_and_in() {
        let e = FilterExpr::between("n", Value::I64(1), Value::I64(5));
        assert_eq!(e.to_string(), "n BETWEEN 1 AND 5");

        let e = FilterExpr::is_in(
            "tag",
            vec![Value::Str("a".into()), Value::Str("b".into())],
        );
        assert_eq!(e.to_string(), "tag IN ('a', 'b')");
    }

    #[test]
    fn between_reorders_numeric_bounds() {
        let e = FilterExpr::between("n", Value::I64(9), Value::I64(2));
        assert_eq!(e.to_string(), "n BETWEEN 2 AND 9");
    }

    #[test]
    fn render_escapes_quotes() {
        let e = FilterExpr::eq("name", Value::Str("it's".into()));
        assert_eq!(e.to_string(), "name = 'it\\'s'");
    }

    #[test]
    fn validate_rejects_bad_arity() {
        assert!(FilterExpr::And(vec![]).validate().is_err());
        assert!(FilterExpr::Or(vec![]).validate().is_err());
        assert!(FilterExpr::is_in("f", vec![]).validate().is_err());
        let bad_between = FilterExpr::Cmp {
            field: "f".into(),
            op: CompareOp::Between,
            value: Value::List(vec![Value::I64(1)]),
        };
        assert!(bad_between.validate().is_err());
        assert!(FilterExpr::eq("f", Value::I64(1)).validate().is_ok());
    }
}
