//! Property tests for the filter expression language.

use embervec::filter::{matches, parse, CompareOp, FilterExpr, Value};
use proptest::prelude::*;

fn field_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::I64),
        (-1.0e6f64..1.0e6).prop_map(Value::F64),
        any::<bool>().prop_map(Value::Bool),
        "[ -~]{0,12}".prop_map(Value::Str),
    ]
}

fn leaf_strategy() -> impl Strategy<Value = FilterExpr> {
    let cmp = (
        field_strategy(),
        prop_oneof![
            Just(CompareOp::Eq),
            Just(CompareOp::Ne),
            Just(CompareOp::Lt),
            Just(CompareOp::Le),
            Just(CompareOp::Gt),
            Just(CompareOp::Ge),
        ],
        scalar_strategy(),
    )
        .prop_map(|(field, op, value)| FilterExpr::Cmp { field, op, value });

    let like = (field_strategy(), "[ -~]{0,10}")
        .prop_map(|(field, pattern)| FilterExpr::like(field, pattern));
    let regex = (field_strategy(), "[a-z0-9.*+]{0,8}")
        .prop_map(|(field, pattern)| FilterExpr::regex(field, pattern));
    let in_list = (field_strategy(), prop::collection::vec(scalar_strategy(), 1..4))
        .prop_map(|(field, items)| FilterExpr::is_in(field, items));
    let between = (field_strategy(), scalar_strategy(), scalar_strategy())
        .prop_map(|(field, lo, hi)| FilterExpr::between(field, lo, hi));

    prop_oneof![cmp, like, regex, in_list, between]
}

fn expr_strategy() -> impl Strategy<Value = FilterExpr> {
    leaf_strategy().prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4).prop_map(FilterExpr::And),
            prop::collection::vec(inner.clone(), 2..4).prop_map(FilterExpr::Or),
            inner.prop_map(|e| FilterExpr::Not(Box::new(e))),
        ]
    })
}

proptest! {
    /// parse(render(expr)) == expr for any well-formed expression.
    #[test]
    fn render_parse_round_trip(expr in expr_strategy()) {
        let rendered = expr.to_string();
        let reparsed = parse(&rendered)
            .unwrap_or_else(|e| panic!("failed to reparse {rendered:?}: {e}"));
        prop_assert_eq!(reparsed, expr);
    }

    /// Well-formed generated expressions always pass validation.
    #[test]
    fn generated_expressions_validate(expr in expr_strategy()) {
        prop_assert!(expr.validate().is_ok());
    }

    /// Negation is an involution under evaluation.
    #[test]
    fn double_negation_is_identity(
        expr in expr_strategy(),
        key in field_strategy(),
        value in "[ -~]{0,8}",
    ) {
        let mut metadata = std::collections::HashMap::new();
        metadata.insert(key, value);
        let double = FilterExpr::not(FilterExpr::not(expr.clone()));
        prop_assert_eq!(matches(&expr, &metadata), matches(&double, &metadata));
    }
}

#[test]
fn spec_precedence_example() {
    // Standard SQL precedence, not the first-split scan: AND binds tighter.
    let expr = parse("a = 1 AND b = 2 OR c = 3").unwrap();
    assert_eq!(expr.to_string(), "(a = 1 AND b = 2) OR c = 3");

    let mut metadata = std::collections::HashMap::new();
    metadata.insert("c".to_string(), "3".to_string());
    // Under the correct precedence, c = 3 alone satisfies the expression.
    assert!(matches(&expr, &metadata));
}
