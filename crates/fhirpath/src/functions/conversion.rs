//! `toX()`/`convertsToX()` scalar conversions (§4.3).

use std::str::FromStr;

use fhirpath_support::{EvaluationError, Sequence, Value};
use rust_decimal::Decimal;

use crate::evaluator::to_singleton;

/// Renders a single value the way `&` string concatenation and `trace()`'s
/// default label text expect: every System primitive has an unambiguous
/// textual form.
pub fn value_to_display_string(v: &Value) -> Result<String, EvaluationError> {
    Ok(match v {
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::String(s) => s.clone(),
        Value::Date(s) | Value::Time(s) | Value::DateTime(s) => s.clone(),
        Value::Node(_) => return Err(EvaluationError::type_error("cannot convert an object to a string")),
    })
}

fn try_boolean(v: &Value) -> Option<bool> {
    match v {
        Value::Boolean(b) => Some(*b),
        Value::Integer(1) => Some(true),
        Value::Integer(0) => Some(false),
        Value::Decimal(d) if *d == Decimal::ONE => Some(true),
        Value::Decimal(d) if d.is_zero() => Some(false),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
            "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn to_boolean(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(try_boolean(&v).map(Value::Boolean).into_iter().collect()),
    }
}

pub fn converts_to_boolean(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Boolean(try_boolean(&v).is_some())]),
    }
}

fn try_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Integer(i) => Some(*i),
        Value::String(s) => i64::from_str(s.trim()).ok(),
        Value::Boolean(true) => Some(1),
        Value::Boolean(false) => Some(0),
        _ => None,
    }
}

pub fn to_integer(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(try_integer(&v).map(Value::Integer).into_iter().collect()),
    }
}

pub fn converts_to_integer(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Boolean(try_integer(&v).is_some())]),
    }
}

fn try_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Decimal(d) => Some(*d),
        Value::Integer(i) => Some(Decimal::from(*i)),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Boolean(true) => Some(Decimal::ONE),
        Value::Boolean(false) => Some(Decimal::ZERO),
        _ => None,
    }
}

pub fn to_decimal(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(try_decimal(&v).map(Value::Decimal).into_iter().collect()),
    }
}

pub fn converts_to_decimal(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Boolean(try_decimal(&v).is_some())]),
    }
}

pub fn to_string_fn(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::String(value_to_display_string(&v)?)]),
    }
}

pub fn converts_to_string(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Boolean(value_to_display_string(&v).is_ok())]),
    }
}

const DATE_RE: &str = r"^\d{4}(-\d{2}(-\d{2})?)?$";
const TIME_RE: &str = r"^\d{2}(:\d{2}(:\d{2}(\.\d+)?)?)?$";
const DATETIME_RE: &str = r"^\d{4}(-\d{2}(-\d{2}(T\d{2}(:\d{2}(:\d{2}(\.\d+)?)?)?(Z|[+-]\d{2}:\d{2})?)?)?)?$";

fn matches_pattern(pattern: &str, s: &str) -> bool {
    regex::Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false)
}

fn try_date(v: &Value) -> Option<String> {
    match v {
        Value::Date(s) => Some(s.clone()),
        Value::DateTime(s) => s.split('T').next().map(|d| d.to_string()),
        Value::String(s) if matches_pattern(DATE_RE, s) => Some(s.clone()),
        _ => None,
    }
}

pub fn to_date(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(try_date(&v).map(Value::Date).into_iter().collect()),
    }
}

pub fn converts_to_date(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Boolean(try_date(&v).is_some())]),
    }
}

fn try_time(v: &Value) -> Option<String> {
    match v {
        Value::Time(s) => Some(s.clone()),
        Value::String(s) if matches_pattern(TIME_RE, s) => Some(s.clone()),
        _ => None,
    }
}

pub fn to_time(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(try_time(&v).map(Value::Time).into_iter().collect()),
    }
}

pub fn converts_to_time(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Boolean(try_time(&v).is_some())]),
    }
}

fn try_date_time(v: &Value) -> Option<String> {
    match v {
        Value::DateTime(s) => Some(s.clone()),
        Value::Date(s) => Some(s.clone()),
        Value::String(s) if matches_pattern(DATETIME_RE, s) => Some(s.clone()),
        _ => None,
    }
}

pub fn to_date_time(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(try_date_time(&v).map(Value::DateTime).into_iter().collect()),
    }
}

pub fn converts_to_date_time(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Boolean(try_date_time(&v).is_some())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_to_boolean_accepts_common_spellings() {
        assert_eq!(to_boolean(&[Value::String("yes".into())]).unwrap(), vec![Value::Boolean(true)]);
        assert_eq!(to_boolean(&[Value::String("maybe".into())]).unwrap(), Sequence::new());
    }

    #[test]
    fn converts_to_integer_rejects_non_numeric_strings() {
        assert_eq!(converts_to_integer(&[Value::String("abc".into())]).unwrap(), vec![Value::Boolean(false)]);
        assert_eq!(converts_to_integer(&[Value::String("42".into())]).unwrap(), vec![Value::Boolean(true)]);
    }

    #[test]
    fn to_decimal_accepts_integer_and_decimal_strings() {
        assert_eq!(to_decimal(&[Value::String("3.14".into())]).unwrap(), vec![Value::Decimal(Decimal::new(314, 2))]);
    }

    #[test]
    fn to_date_truncates_date_time_to_date_part() {
        assert_eq!(
            to_date(&[Value::DateTime("2020-01-02T10:00:00".into())]).unwrap(),
            vec![Value::Date("2020-01-02".into())]
        );
    }
}
