//! Equality, equivalence, ordering and type-testing (§4.5, §3).

use std::cmp::Ordering;

use fhirpath_support::{EvaluationError, Sequence, TypeName, Value};
use rust_decimal::Decimal;

use crate::ast::{Expr, ExprKind};
use crate::evaluator::to_singleton;

/// `=` at the single-value level. `Value`'s own `PartialEq` already treats an
/// `Integer` and a `Decimal` of equal numeric value as equal and compares
/// `Node`s structurally, so there is nothing more to add here; kept as a
/// named function (rather than inlining `a == b`) since other equality-like
/// comparisons (`~`, sequence equality) build on it.
pub fn value_equals(a: &Value, b: &Value) -> Option<bool> {
    Some(a == b)
}

/// `=`/`!=` over whole sequences: same length, pairwise equal. `Ok(None)`
/// means the overall result is empty (propagated by the caller), never
/// produced by this implementation but kept for symmetry with other
/// evaluation-error-returning helpers.
pub fn sequence_equals(l: &[Value], r: &[Value]) -> Result<Option<bool>, EvaluationError> {
    if l.len() != r.len() {
        return Ok(Some(false));
    }
    for (a, b) in l.iter().zip(r.iter()) {
        match value_equals(a, b) {
            Some(true) => continue,
            Some(false) => return Ok(Some(false)),
            None => return Ok(None),
        }
    }
    Ok(Some(true))
}

/// `~`/`!~`: like `=` but case/whitespace-insensitive for strings and
/// precision-insensitive for decimals, and never empty-propagating — two
/// empty collections are equivalent, unlike `{} = {}` which is empty.
pub fn sequence_equivalent(l: &[Value], r: &[Value]) -> bool {
    if l.len() != r.len() {
        return false;
    }
    l.iter().zip(r.iter()).all(|(a, b)| value_equivalent(a, b))
}

fn value_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => normalize_whitespace(x) == normalize_whitespace(y),
        (Value::Integer(_) | Value::Decimal(_), Value::Integer(_) | Value::Decimal(_)) => decimal_equivalent(a, b),
        _ => value_equals(a, b) == Some(true),
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn decimal_equivalent(a: &Value, b: &Value) -> bool {
    let da = as_decimal(a);
    let db = as_decimal(b);
    let precision = da.scale().min(db.scale());
    da.round_dp(precision) == db.round_dp(precision)
}

fn as_decimal(v: &Value) -> Decimal {
    match v {
        Value::Integer(i) => Decimal::from(*i),
        Value::Decimal(d) => *d,
        _ => unreachable!("only called for Integer/Decimal"),
    }
}

/// `<`/`>`/`<=`/`>=` between two singleton values. Only same-ish-typed
/// operands are ordered (§3 Non-goals excludes coercion across unrelated
/// types); mixed Integer/Decimal compares numerically.
pub fn compare_values(a: &Value, b: &Value) -> Result<Ordering, EvaluationError> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
        (Value::Integer(_) | Value::Decimal(_), Value::Integer(_) | Value::Decimal(_)) => {
            Ok(as_decimal(a).cmp(&as_decimal(b)))
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => Ok(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Ok(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Ok(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Ok(x.cmp(y)),
        _ => Err(EvaluationError::type_error("operands are not ordered-comparable")),
    }
}

/// `is`: whether `v`'s runtime type matches `type_name`. FHIR resource
/// objects match on `resourceType`; System primitives match on their own
/// type name. There is no FHIR type hierarchy here (§3 Non-goals) so a
/// `Node` only ever matches its own `resourceType`, never a supertype.
pub fn value_is_type(v: &Value, type_name: &TypeName) -> bool {
    let want = type_name.name.as_str();
    match v {
        Value::Boolean(_) => want.eq_ignore_ascii_case("boolean"),
        Value::Integer(_) => want.eq_ignore_ascii_case("integer"),
        Value::Decimal(_) => want.eq_ignore_ascii_case("decimal"),
        Value::String(_) => want.eq_ignore_ascii_case("string"),
        Value::Date(_) => want.eq_ignore_ascii_case("date"),
        Value::Time(_) => want.eq_ignore_ascii_case("time"),
        Value::DateTime(_) => want.eq_ignore_ascii_case("datetime"),
        Value::Node(node) => node
            .as_object()
            .and_then(|obj| obj.get("resourceType"))
            .and_then(|rt| rt.as_str())
            .map(|rt| rt.eq_ignore_ascii_case(want))
            .unwrap_or_else(|| want.eq_ignore_ascii_case("object")),
    }
}

/// `type()`: a simplified type name per element — a full `TypeInfo` object
/// (namespace, base type chain) would need a FHIR model provider, which is
/// out of scope here.
pub fn type_of(input: &[Value]) -> Sequence {
    input.iter().map(|v| Value::String(v.type_name().to_string())).collect()
}

fn extract_type_arg(args: &[Expr]) -> Result<&TypeName, EvaluationError> {
    match args.first().map(|e| &e.kind) {
        Some(ExprKind::TypeReference(t)) => Ok(t),
        _ => Err(EvaluationError::invalid_type_specifier("expected a type name argument")),
    }
}

pub fn of_type(args: &[Expr], input: Sequence) -> Result<Sequence, EvaluationError> {
    let type_name = extract_type_arg(args)?;
    Ok(input.into_iter().filter(|v| value_is_type(v, type_name)).collect())
}

pub fn is_function(args: &[Expr], input: Sequence) -> Result<Sequence, EvaluationError> {
    let type_name = extract_type_arg(args)?;
    match to_singleton(input)? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Boolean(value_is_type(&v, type_name))]),
    }
}

pub fn as_function(args: &[Expr], input: Sequence) -> Result<Sequence, EvaluationError> {
    let type_name = extract_type_arg(args)?;
    match to_singleton(input)? {
        None => Ok(Sequence::new()),
        Some(v) if value_is_type(&v, type_name) => Ok(vec![v]),
        Some(_) => Ok(Sequence::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_decimal_compare_equal_when_numerically_equal() {
        assert_eq!(value_equals(&Value::Integer(1), &Value::Decimal(Decimal::from(1))), Some(true));
    }

    #[test]
    fn equivalence_is_case_and_whitespace_insensitive() {
        assert!(value_equivalent(&Value::String("  Hello  World ".into()), &Value::String("hello world".into())));
    }

    #[test]
    fn equivalence_ignores_decimal_trailing_precision() {
        assert!(decimal_equivalent(&Value::Decimal(Decimal::new(100, 2)), &Value::Decimal(Decimal::new(1, 0))));
    }

    #[test]
    fn sequence_equals_requires_same_length() {
        assert_eq!(sequence_equals(&[Value::Integer(1)], &[]).unwrap(), Some(false));
    }

    #[test]
    fn value_is_type_matches_resource_type() {
        let node = serde_json::json!({"resourceType": "Patient"});
        let v = Value::from_json(std::rc::Rc::new(node)).unwrap();
        assert!(value_is_type(&v, &TypeName::new("Patient")));
        assert!(!value_is_type(&v, &TypeName::new("Observation")));
    }
}
