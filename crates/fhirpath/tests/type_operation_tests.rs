//! `is`/`as`/`ofType`, equality vs. equivalence, and ordering, exercised
//! end-to-end through the engine.

use fhirpath::FhirPathEngine;
use fhirpath_support::Value;

fn engine() -> FhirPathEngine {
    FhirPathEngine::default()
}

#[test]
fn is_matches_the_system_primitive_type_name() {
    let e = engine();
    assert_eq!(e.evaluate("1.is(Integer)", serde_json::Value::Null).unwrap(), vec![Value::Boolean(true)]);
    assert_eq!(e.evaluate("1.is(String)", serde_json::Value::Null).unwrap(), vec![Value::Boolean(false)]);
}

#[test]
fn as_returns_empty_rather_than_erroring_on_a_type_mismatch() {
    let result = engine().evaluate("'x'.as(Integer)", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![]);
}

#[test]
fn of_type_filters_a_mixed_collection() {
    let input = serde_json::json!({"resourceType": "Patient", "name": "irrelevant"});
    let result = engine().evaluate("(1 | 'a' | 2).ofType(Integer)", input).unwrap();
    assert_eq!(result, vec![Value::Integer(1), Value::Integer(2)]);
}

#[test]
fn equality_is_pairwise_and_requires_equal_length() {
    let e = engine();
    assert_eq!(e.evaluate("(1 | 2) = (1 | 2)", serde_json::Value::Null).unwrap(), vec![Value::Boolean(true)]);
    assert_eq!(e.evaluate("(1 | 2) = (1)", serde_json::Value::Null).unwrap(), vec![Value::Boolean(false)]);
}

#[test]
fn equivalence_ignores_whitespace_case_and_decimal_trailing_precision() {
    let e = engine();
    assert_eq!(e.evaluate("'  Hi there ' ~ 'hi there'", serde_json::Value::Null).unwrap(), vec![Value::Boolean(true)]);
    assert_eq!(e.evaluate("1.10 ~ 1.1", serde_json::Value::Null).unwrap(), vec![Value::Boolean(true)]);
}

#[test]
fn equality_on_empty_operands_is_empty_not_false() {
    let result = engine().evaluate("{} = 1", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![]);
}

#[test]
fn ordering_compares_mixed_integer_and_decimal_numerically() {
    let result = engine().evaluate("1 < 1.5", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Boolean(true)]);
}

#[test]
fn type_function_reports_a_simplified_type_name() {
    let result = engine().evaluate("true.type()", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::String("Boolean".into())]);
}
