//! `defineVariable`/`%name` scoping end-to-end (§4.7, §8 scenario 6).
//!
//! `defineVariable` bindings are forward-visible for the rest of the
//! expression that defined them, not scoped to the subtree — see the module
//! docs on [`fhirpath::context::Context`] for why this engine shares the
//! variable table across every context derived from one evaluation rather
//! than threading a return-context through every call.

use fhirpath::FhirPathEngine;
use fhirpath_support::Value;

fn engine() -> FhirPathEngine {
    FhirPathEngine::default()
}

#[test]
fn defined_variable_is_visible_to_a_later_select_argument() {
    let input = serde_json::json!([10, 20]);
    let result = engine().evaluate("defineVariable('x', 5).select(%x + 1)", input).unwrap();
    assert_eq!(result, vec![Value::Integer(6), Value::Integer(6)]);
}

#[test]
fn define_variable_returns_its_input_unchanged() {
    let result = engine().evaluate("5.defineVariable('v1', 10)", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Integer(5)]);
}

#[test]
fn redefining_a_variable_overwrites_the_previous_binding() {
    let result = engine()
        .evaluate("defineVariable('x', 1).defineVariable('x', 2).select(%x)", serde_json::Value::Null)
        .unwrap();
    assert_eq!(result, vec![Value::Integer(2)]);
}

#[test]
fn host_registered_variables_are_visible_alongside_defined_ones() {
    let engine = FhirPathEngine::builder().with_variable("limit", vec![Value::Integer(100)]).build();
    let result = engine.evaluate("defineVariable('x', 1).select(%x + %limit)", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Integer(101)]);
}

#[test]
fn referencing_an_unbound_variable_is_an_evaluation_error() {
    assert!(engine().evaluate("%nope", serde_json::Value::Null).is_err());
}
