//! `lowBoundary()`/`highBoundary()`/`precision()` end-to-end (§6 supplemented
//! features) — restricted to `Decimal`/`Integer`/`Date`/`Time`/`DateTime`
//! since `Quantity`/UCUM is out of scope.

use fhirpath::FhirPathEngine;
use fhirpath_support::Value;
use rust_decimal::Decimal;

fn engine() -> FhirPathEngine {
    FhirPathEngine::default()
}

#[test]
fn decimal_low_boundary_widens_by_half_a_unit_in_the_last_place() {
    let result = engine().evaluate("1.2.lowBoundary()", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Decimal(Decimal::new(115, 2))]);
}

#[test]
fn decimal_high_boundary_widens_upward() {
    let result = engine().evaluate("1.2.highBoundary()", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Decimal(Decimal::new(125, 2))]);
}

#[test]
fn partial_date_low_boundary_is_the_first_of_the_month() {
    let result = engine().evaluate("@2020-01.lowBoundary()", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Date("2020-01-01".into())]);
}

#[test]
fn partial_date_high_boundary_accounts_for_month_length() {
    let result = engine().evaluate("@2020-02.highBoundary()", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Date("2020-02-29".into())]);
}

#[test]
fn full_date_time_low_boundary_fills_in_the_time_of_day() {
    let result = engine().evaluate("@2020-01-02.lowBoundary()", serde_json::Value::Null);
    assert_eq!(result.unwrap(), vec![Value::Date("2020-01-02".into())]);
}

#[test]
fn precision_counts_decimal_scale() {
    let result = engine().evaluate("1.250.precision()", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Integer(3)]);
}

#[test]
fn precision_counts_date_components() {
    let result = engine().evaluate("@2020-01.precision()", serde_json::Value::Null).unwrap();
    assert_eq!(result, vec![Value::Integer(2)]);
}
