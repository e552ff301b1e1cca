//! A broad sweep over the built-in function library (§4.6), one assertion
//! per function family rather than an exhaustive grid — the colocated unit
//! tests in each `functions/*.rs` module cover edge cases in depth.

use fhirpath::FhirPathEngine;
use fhirpath_support::Value;

fn engine() -> FhirPathEngine {
    FhirPathEngine::default()
}

fn eval(expr: &str) -> fhirpath_support::Sequence {
    engine().evaluate(expr, serde_json::Value::Null).unwrap()
}

#[test]
fn collection_functions() {
    assert_eq!(eval("{}.empty()"), vec![Value::Boolean(true)]);
    assert_eq!(eval("(1 | 2 | 3).count()"), vec![Value::Integer(3)]);
    assert_eq!(eval("(1 | 2 | 3).first()"), vec![Value::Integer(1)]);
    assert_eq!(eval("(1 | 2 | 3).last()"), vec![Value::Integer(3)]);
    assert_eq!(eval("(1 | 2 | 3).tail()"), vec![Value::Integer(2), Value::Integer(3)]);
    assert_eq!(eval("(1 | 2 | 3).skip(1)"), vec![Value::Integer(2), Value::Integer(3)]);
    assert_eq!(eval("(1 | 2 | 3).take(2)"), vec![Value::Integer(1), Value::Integer(2)]);
}

#[test]
fn set_like_functions_preserve_first_seen_order() {
    assert_eq!(eval("(1 | 2).intersect(2 | 3)"), vec![Value::Integer(2)]);
    assert_eq!(eval("(1 | 2).exclude(2)"), vec![Value::Integer(1)]);
    assert_eq!(eval("(1 | 2).subsetOf(1 | 2 | 3)"), vec![Value::Boolean(true)]);
}

#[test]
fn boolean_aggregate_functions() {
    assert_eq!(eval("(true | true).allTrue()"), vec![Value::Boolean(true)]);
    assert_eq!(eval("(true | false).anyTrue()"), vec![Value::Boolean(true)]);
    assert_eq!(eval("(false | false).allFalse()"), vec![Value::Boolean(true)]);
}

#[test]
fn iif_is_a_lazy_three_argument_conditional() {
    assert_eq!(eval("iif(true, 1, 1/0)"), vec![Value::Integer(1)]);
    assert_eq!(eval("iif(false, 1/0, 2)"), vec![Value::Integer(2)]);
}

#[test]
fn string_functions() {
    assert_eq!(eval("'Hello'.upper()"), vec![Value::String("HELLO".into())]);
    assert_eq!(eval("'Hello'.lower()"), vec![Value::String("hello".into())]);
    assert_eq!(eval("'Hello'.length()"), vec![Value::Integer(5)]);
    assert_eq!(eval("'Hello World'.substring(6)"), vec![Value::String("World".into())]);
    assert_eq!(eval("'Hello'.startsWith('He')"), vec![Value::Boolean(true)]);
    assert_eq!(eval("'Hello'.contains('ell')"), vec![Value::Boolean(true)]);
    assert_eq!(eval("'a,b,c'.split(',').count()"), vec![Value::Integer(3)]);
}

#[test]
fn math_functions() {
    assert_eq!(eval("(-5).abs()"), vec![Value::Integer(5)]);
    assert_eq!(eval("2.power(10)"), vec![Value::Integer(1024)]);
    assert_eq!(eval("4.sqrt()"), vec![Value::Decimal("2".parse().unwrap())]);
}

#[test]
fn conversion_functions() {
    assert_eq!(eval("'42'.toInteger()"), vec![Value::Integer(42)]);
    assert_eq!(eval("'true'.toBoolean()"), vec![Value::Boolean(true)]);
    assert_eq!(eval("42.toString()"), vec![Value::String("42".into())]);
    assert_eq!(eval("'abc'.convertsToInteger()"), vec![Value::Boolean(false)]);
}

#[test]
fn trace_passes_its_input_through_unchanged() {
    assert_eq!(eval("(1 | 2).trace('label')"), vec![Value::Integer(1), Value::Integer(2)]);
}
