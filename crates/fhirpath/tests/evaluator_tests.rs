//! End-to-end navigation/filtering/arithmetic scenarios against a real engine
//! (not the colocated unit tests, which exercise individual helpers).

use fhirpath::FhirPathEngine;
use fhirpath_support::Value;

fn engine() -> FhirPathEngine {
    FhirPathEngine::default()
}

#[test]
fn navigation_flattens_across_repeating_elements() {
    let input = serde_json::json!({ "name": [ { "given": ["John", "Q"] }, { "given": ["Jane"] } ] });
    let result = engine().evaluate("name.given", input).unwrap();
    assert_eq!(
        result,
        vec![Value::String("John".into()), Value::String("Q".into()), Value::String("Jane".into())]
    );
}

#[test]
fn where_uses_this_as_the_iteration_context() {
    let input = serde_json::json!({ "item": [{"v": 1}, {"v": 2}, {"v": 3}] });
    let result = engine().evaluate("item.where($this.v > 1).v", input).unwrap();
    assert_eq!(result, vec![Value::Integer(2), Value::Integer(3)]);
}

#[test]
fn three_valued_logic_over_empty_operands() {
    let e = engine();
    assert_eq!(e.evaluate("true and {}", serde_json::Value::Null).unwrap(), vec![]);
    assert_eq!(e.evaluate("false and {}", serde_json::Value::Null).unwrap(), vec![Value::Boolean(false)]);
    assert_eq!(e.evaluate("true or {}", serde_json::Value::Null).unwrap(), vec![Value::Boolean(true)]);
}

#[test]
fn arithmetic_on_a_multi_element_collection_is_a_singleton_error() {
    let input = serde_json::json!({"a": [1, 2]});
    let err = engine().evaluate("a + 1", input).unwrap_err();
    assert!(err.contains("singleton") || err.contains("Singleton"), "unexpected message: {err}");
}

#[test]
fn union_preserves_first_seen_order_and_drops_duplicates() {
    let result = engine().evaluate("(1 | 2 | 2 | 3 | 1)", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
}

#[test]
fn index_out_of_bounds_is_empty_not_an_error() {
    let result = engine().evaluate("(1 | 2 | 3)[10]", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![]);
}

#[test]
fn decimal_division_by_zero_is_an_error_but_integer_div_is_empty() {
    let e = engine();
    assert!(e.evaluate("1.0 / 0", serde_json::Value::Null).is_err());
    assert_eq!(e.evaluate("1 div 0", serde_json::Value::Null).unwrap(), vec![]);
}

#[test]
fn distinct_is_idempotent() {
    let input = serde_json::json!({"a": [1, 2, 2, 3]});
    let e = engine();
    let once = e.evaluate("a.distinct()", input.clone()).unwrap();
    let twice = e.evaluate("a.distinct().distinct()", input).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn combine_count_is_the_sum_of_operand_counts() {
    let input = serde_json::json!({"a": [1, 2], "b": [3, 4, 5]});
    let result = engine().evaluate("a.combine(b).count()", input).unwrap();
    assert_eq!(result, vec![Value::Integer(5)]);
}

#[test]
fn null_resource_field_navigates_to_empty() {
    let input = serde_json::json!({"active": null});
    let result = engine().evaluate("active", input).unwrap();
    assert_eq!(result, vec![]);
}
