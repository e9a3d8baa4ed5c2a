//! Metadata filter expressions.
//!
//! A filter is a boolean tree of comparisons over the string-to-string
//! metadata map attached to each embedding. Filters have three lives:
//!
//! - parsed from text ([`parse`]) via a pest grammar with standard
//!   precedence (`OR` loosest, then `AND`, then `NOT`, parentheses bind),
//! - evaluated in memory against candidate metadata ([`matches`]), the
//!   post-filter path,
//! - lowered to parameterized predicate SQL ([`lower`]), the pre-filter
//!   path. Lowering is total: if any subexpression cannot be lowered the
//!   whole filter is evaluated as a post-filter instead.
//!
//! [`FilterExpr`]'s `Display` renders the canonical text form;
//! `parse(render(expr))` reproduces the expression.

mod ast;
mod eval;
mod parser;
mod sql;

pub use ast::{CompareOp, FilterExpr, Value};
pub use eval::matches;
pub use parser::parse;
pub use sql::{lower, SqlParam, SqlPredicate};

use thiserror::Error;

/// Filter parsing and lowering failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The filter string is malformed.
    #[error("filter parse error: {0}")]
    Parse(String),

    /// A subexpression has no SQL form (e.g. REGEX, mixed-type IN lists).
    #[error("filter cannot be lowered to SQL: {0}")]
    Unlowerable(String),

    /// A programmatically-built expression violates an arity invariant.
    #[error("invalid filter expression: {0}")]
    Invalid(String),
}
