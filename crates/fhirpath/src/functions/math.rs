//! Arithmetic functions and the supplemented boundary/precision family (§4.3,
//! §6 supplemented features).

use chrono::{Datelike, NaiveDate};
use fhirpath_support::{EvaluationError, Sequence, Value};
use rust_decimal::{Decimal, MathematicalOps};

use crate::ast::Expr;
use crate::context::Context;
use crate::evaluator::{to_singleton, Evaluator};

fn as_decimal(v: &Value) -> Result<Decimal, EvaluationError> {
    match v {
        Value::Integer(i) => Ok(Decimal::from(*i)),
        Value::Decimal(d) => Ok(*d),
        _ => Err(EvaluationError::type_error("expected a numeric value")),
    }
}

fn is_int(v: &Value) -> bool {
    matches!(v, Value::Integer(_))
}

pub fn abs(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(Value::Integer(i)) => Ok(vec![Value::Integer(i.abs())]),
        Some(Value::Decimal(d)) => Ok(vec![Value::Decimal(d.abs())]),
        Some(_) => Err(EvaluationError::type_error("abs() requires a numeric value")),
    }
}

pub fn ceiling(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Integer(i64_from_decimal(as_decimal(&v)?.ceil())?)]),
    }
}

pub fn floor(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Integer(i64_from_decimal(as_decimal(&v)?.floor())?)]),
    }
}

pub fn truncate(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Integer(i64_from_decimal(as_decimal(&v)?.trunc())?)]),
    }
}

fn i64_from_decimal(d: Decimal) -> Result<i64, EvaluationError> {
    i64::try_from(d).map_err(|_| EvaluationError::invalid_operation("result out of Integer range"))
}

pub fn round(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let v = match to_singleton(input.clone())? {
        None => return Ok(Sequence::new()),
        Some(v) => v,
    };
    let precision = match args.first() {
        Some(expr) => match to_singleton(evaluator.evaluate(expr, input, context)?)? {
            None => return Ok(Sequence::new()),
            Some(Value::Integer(i)) => i,
            Some(_) => return Err(EvaluationError::type_error("round() precision must be an Integer")),
        },
        None => 0,
    };
    let d = as_decimal(&v)?;
    Ok(vec![Value::Decimal(d.round_dp(precision.max(0) as u32))])
}

pub fn sqrt(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => {
            let d = as_decimal(&v)?;
            if d.is_sign_negative() {
                return Ok(Sequence::new());
            }
            d.sqrt().map(|r| vec![Value::Decimal(r)]).ok_or_else(|| EvaluationError::invalid_operation("sqrt() failed to converge"))
        }
    }
}

pub fn exp(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Decimal(as_decimal(&v)?.exp())]),
    }
}

pub fn ln(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => {
            let d = as_decimal(&v)?;
            if d.is_sign_negative() || d.is_zero() {
                return Ok(Sequence::new());
            }
            Ok(vec![Value::Decimal(d.ln())])
        }
    }
}

pub fn log(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let base_expr = args.first().ok_or_else(|| EvaluationError::invalid_arity("log() requires a base argument"))?;
    let v = match to_singleton(input.clone())? {
        None => return Ok(Sequence::new()),
        Some(v) => v,
    };
    let base = match to_singleton(evaluator.evaluate(base_expr, input, context)?)? {
        None => return Ok(Sequence::new()),
        Some(b) => as_decimal(&b)?,
    };
    let d = as_decimal(&v)?;
    if d.is_sign_negative() || d.is_zero() || base.is_sign_negative() || base.is_zero() {
        return Ok(Sequence::new());
    }
    Ok(vec![Value::Decimal(d.ln() / base.ln())])
}

pub fn power(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let exponent_expr = args.first().ok_or_else(|| EvaluationError::invalid_arity("power() requires an exponent argument"))?;
    let v = match to_singleton(input.clone())? {
        None => return Ok(Sequence::new()),
        Some(v) => v,
    };
    let exponent = match to_singleton(evaluator.evaluate(exponent_expr, input, context)?)? {
        None => return Ok(Sequence::new()),
        Some(e) => as_decimal(&e)?,
    };
    let base = as_decimal(&v)?;
    if base.is_sign_negative() && exponent.fract() != Decimal::ZERO {
        return Ok(Sequence::new());
    }
    let result = base.powd(exponent);
    if is_int(&v) && exponent.fract().is_zero() && !exponent.is_sign_negative() {
        if let Ok(i) = i64::try_from(result) {
            return Ok(vec![Value::Integer(i)]);
        }
    }
    Ok(vec![Value::Decimal(result)])
}

/// `precision()`: the number of significant digits after the decimal point
/// for a `Decimal`, or the number of calendar components present for a
/// `Date`/`Time`/`DateTime` literal — restricted to these types since
/// FHIRPath's `Quantity` (which also has a precision) is out of scope here.
pub fn precision(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(Value::Decimal(d)) => Ok(vec![Value::Integer(d.scale() as i64)]),
        Some(Value::Integer(_)) => Ok(vec![Value::Integer(0)]),
        Some(Value::Date(s)) => Ok(vec![Value::Integer(date_component_count(&s))]),
        Some(Value::Time(s)) => Ok(vec![Value::Integer(time_component_count(&s))]),
        Some(Value::DateTime(s)) => Ok(vec![Value::Integer(datetime_component_count(&s))]),
        Some(_) => Err(EvaluationError::type_error("precision() only applies to Decimal, Date, Time or DateTime")),
    }
}

fn date_component_count(s: &str) -> i64 {
    s.split('-').count() as i64
}

fn time_component_count(s: &str) -> i64 {
    let without_fraction = s.split('.').next().unwrap_or(s);
    without_fraction.split(':').count() as i64
}

fn datetime_component_count(s: &str) -> i64 {
    match s.split_once('T') {
        Some((date, time)) => date_component_count(date) + time_component_count(time),
        None => date_component_count(s),
    }
}

/// `lowBoundary([precision])`: the smallest value consistent with the
/// operand's own precision (e.g. `1.2` with one decimal digit of precision
/// could represent anything in `[1.15, 1.25)`, so its low boundary is
/// `1.15`), widened to `precision` digits if given and larger than the
/// operand's own.
pub fn low_boundary(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    boundary(evaluator, args, input, context, true)
}

pub fn high_boundary(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    boundary(evaluator, args, input, context, false)
}

fn boundary(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context, low: bool) -> Result<Sequence, EvaluationError> {
    let target_precision = match args.first() {
        Some(expr) => match to_singleton(evaluator.evaluate(expr, input.clone(), context)?)? {
            None => None,
            Some(Value::Integer(i)) => Some(i.max(0) as u32),
            Some(_) => return Err(EvaluationError::type_error("boundary precision must be an Integer")),
        },
        None => None,
    };
    match to_singleton(input)? {
        None => Ok(Sequence::new()),
        Some(Value::Decimal(d)) => {
            let scale = d.scale();
            let half_ulp = Decimal::new(5, scale + 1);
            let widened = if low { d - half_ulp } else { d + half_ulp };
            let result_scale = target_precision.unwrap_or(scale).max(scale + 1);
            Ok(vec![Value::Decimal(widened.round_dp(result_scale))])
        }
        Some(Value::Integer(i)) => {
            let half_ulp = Decimal::new(5, 1);
            let widened = if low { Decimal::from(i) - half_ulp } else { Decimal::from(i) + half_ulp };
            Ok(vec![Value::Decimal(widened.round_dp(target_precision.unwrap_or(1)))])
        }
        Some(Value::Date(s)) => Ok(vec![Value::Date(date_boundary(&s, low))]),
        Some(Value::Time(s)) => Ok(vec![Value::Time(time_boundary(&s, low))]),
        Some(Value::DateTime(s)) => Ok(vec![Value::DateTime(date_time_boundary(&s, low))]),
        Some(_) => Err(EvaluationError::type_error(
            "lowBoundary()/highBoundary() only apply to Decimal, Integer, Date, Time or DateTime",
        )),
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Widens a partial `Date` literal to its full `YYYY-MM-DD` extent. A
/// fully-specified date has no remaining precision to widen and is returned
/// unchanged.
fn date_boundary(s: &str, low: bool) -> String {
    let parts: Vec<&str> = s.split('-').collect();
    match (parts.first().and_then(|y| y.parse::<i32>().ok()), parts.len()) {
        (Some(year), 1) => {
            if low { format!("{year:04}-01-01") } else { format!("{year:04}-12-31") }
        }
        (Some(year), 2) => {
            let month: u32 = parts[1].parse().unwrap_or(1);
            if low {
                format!("{year:04}-{month:02}-01")
            } else {
                format!("{year:04}-{month:02}-{:02}", days_in_month(year, month))
            }
        }
        _ => s.to_string(),
    }
}

/// Widens a partial `Time` literal to its full `HH:MM:SS.sss` extent.
fn time_boundary(s: &str, low: bool) -> String {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.len() {
        1 => if low { format!("{}:00:00.000", parts[0]) } else { format!("{}:59:59.999", parts[0]) },
        2 => if low { format!("{}:{}:00.000", parts[0], parts[1]) } else { format!("{}:{}:59.999", parts[0], parts[1]) },
        _ => s.to_string(),
    }
}

/// Splits a time-of-day string from a trailing `Z` or `+hh:mm`/`-hh:mm`
/// timezone offset, if present.
fn split_timezone(time: &str) -> (&str, &str) {
    if let Some(idx) = time.find('Z') {
        return (&time[..idx], &time[idx..]);
    }
    if let Some(idx) = time.find('+') {
        return (&time[..idx], &time[idx..]);
    }
    if let Some(idx) = time.rfind('-') {
        return (&time[..idx], &time[idx..]);
    }
    (time, "")
}

fn date_time_boundary(s: &str, low: bool) -> String {
    match s.split_once('T') {
        Some((date, time)) => {
            let date_is_partial = date.split('-').count() < 3;
            let date_full = date_boundary(date, low);
            if date_is_partial {
                let day_edge = if low { "00:00:00.000" } else { "23:59:59.999" };
                format!("{date_full}T{day_edge}")
            } else {
                let (time_part, tz) = split_timezone(time);
                format!("{date_full}T{}{tz}", time_boundary(time_part, low))
            }
        }
        None => {
            let date_full = date_boundary(s, low);
            let day_edge = if low { "00:00:00.000" } else { "23:59:59.999" };
            format!("{date_full}T{day_edge}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_and_floor_round_toward_integer_bounds() {
        assert_eq!(ceiling(&[Value::Decimal(Decimal::new(15, 1))]).unwrap(), vec![Value::Integer(2)]);
        assert_eq!(floor(&[Value::Decimal(Decimal::new(15, 1))]).unwrap(), vec![Value::Integer(1)]);
    }

    #[test]
    fn precision_counts_decimal_digits() {
        assert_eq!(precision(&[Value::Decimal(Decimal::new(1250, 3))]).unwrap(), vec![Value::Integer(3)]);
    }

    #[test]
    fn precision_counts_date_components() {
        assert_eq!(precision(&[Value::Date("2020-01".into())]).unwrap(), vec![Value::Integer(2)]);
    }

    #[test]
    fn sqrt_of_negative_is_empty() {
        assert_eq!(sqrt(&[Value::Integer(-4)]).unwrap(), Sequence::new());
    }

    #[test]
    fn date_boundary_widens_to_month_extent() {
        assert_eq!(date_boundary("2020-01", true), "2020-01-01");
        assert_eq!(date_boundary("2020-02", false), "2020-02-29");
    }

    #[test]
    fn date_time_boundary_fills_in_time_of_day() {
        assert_eq!(date_time_boundary("2020-01-02", true), "2020-01-02T00:00:00.000");
        assert_eq!(date_time_boundary("2020-01-02", false), "2020-01-02T23:59:59.999");
    }
}
