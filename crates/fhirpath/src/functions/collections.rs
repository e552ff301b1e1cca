//! Collection, filtering, set and control-flow functions (§4.6).
//!
//! These are the functions whose arguments are mostly `Expression`-kind: a
//! sub-expression evaluated once per input element with `$this`/`$index`
//! bound to that element, rather than once up front against the caller's
//! input. [`crate::functions::dispatch`] decides which convention a given
//! argument position uses by consulting the registry; the functions here
//! just assume they've already been handed the right thing.

use fhirpath_support::{EvaluationError, Sequence, Value};

use crate::ast::Expr;
use crate::context::Context;
use crate::evaluator::{to_singleton, Evaluator};
use crate::functions::type_ops::value_equals;

pub fn empty(input: &[Value]) -> Result<Sequence, EvaluationError> {
    Ok(vec![Value::Boolean(input.is_empty())])
}

pub fn count(input: &[Value]) -> Result<Sequence, EvaluationError> {
    Ok(vec![Value::Integer(input.len() as i64)])
}

pub fn first(input: &[Value]) -> Result<Sequence, EvaluationError> {
    Ok(input.first().cloned().into_iter().collect())
}

pub fn last(input: &[Value]) -> Result<Sequence, EvaluationError> {
    Ok(input.last().cloned().into_iter().collect())
}

pub fn tail(input: &[Value]) -> Result<Sequence, EvaluationError> {
    Ok(if input.is_empty() { Sequence::new() } else { input[1..].to_vec() })
}

pub fn single(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![v]),
    }
}

fn eval_count_arg(evaluator: &Evaluator, expr: &Expr, input: Sequence, context: &Context) -> Result<usize, EvaluationError> {
    match to_singleton(evaluator.evaluate(expr, input, context)?)? {
        Some(Value::Integer(i)) if i >= 0 => Ok(i as usize),
        Some(Value::Integer(_)) => Ok(0),
        Some(_) => Err(EvaluationError::type_error("expected an Integer argument")),
        None => Ok(0),
    }
}

pub fn skip(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let n = eval_count_arg(evaluator, &args[0], input.clone(), context)?;
    Ok(input.into_iter().skip(n).collect())
}

pub fn take(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let n = eval_count_arg(evaluator, &args[0], input.clone(), context)?;
    Ok(input.into_iter().take(n).collect())
}

/// Evaluates a `Value`-kind argument that should itself be a collection
/// (`intersect`, `exclude`, `combine`, `union`, `subsetOf`, `supersetOf`) —
/// the collection-producing expression is evaluated once against the
/// caller's own input, not per-element.
fn eval_collection_arg(evaluator: &Evaluator, expr: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    evaluator.evaluate(expr, input, context)
}

fn contains_value(seq: &[Value], v: &Value) -> bool {
    seq.iter().any(|item| value_equals(item, v) == Some(true))
}

fn dedup(seq: Sequence) -> Sequence {
    let mut result: Sequence = Vec::with_capacity(seq.len());
    for item in seq {
        if !contains_value(&result, &item) {
            result.push(item);
        }
    }
    result
}

pub fn distinct(input: &[Value]) -> Result<Sequence, EvaluationError> {
    Ok(dedup(input.to_vec()))
}

pub fn is_distinct(input: &[Value]) -> Result<Sequence, EvaluationError> {
    Ok(vec![Value::Boolean(dedup(input.to_vec()).len() == input.len())])
}

pub fn intersect(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let other = eval_collection_arg(evaluator, &args[0], input.clone(), context)?;
    Ok(dedup(input.into_iter().filter(|v| contains_value(&other, v)).collect()))
}

pub fn exclude(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let other = eval_collection_arg(evaluator, &args[0], input.clone(), context)?;
    Ok(input.into_iter().filter(|v| !contains_value(&other, v)).collect())
}

/// `combine()`: a plain concatenation, duplicates and all — unlike `union()`
/// and the `|` operator, which both dedup.
pub fn combine(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let other = eval_collection_arg(evaluator, &args[0], input.clone(), context)?;
    let mut result = input;
    result.extend(other);
    Ok(result)
}

pub fn union(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let other = eval_collection_arg(evaluator, &args[0], input.clone(), context)?;
    let mut result = input;
    result.extend(other);
    Ok(dedup(result))
}

pub fn subset_of(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let other = eval_collection_arg(evaluator, &args[0], input.clone(), context)?;
    Ok(vec![Value::Boolean(input.iter().all(|v| contains_value(&other, v)))])
}

pub fn superset_of(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let other = eval_collection_arg(evaluator, &args[0], input.clone(), context)?;
    Ok(vec![Value::Boolean(other.iter().all(|v| contains_value(&input, v)))])
}

fn singleton_boolean(v: &Value) -> Result<bool, EvaluationError> {
    match v {
        Value::Boolean(b) => Ok(*b),
        _ => Err(EvaluationError::type_error("expected a Boolean")),
    }
}

pub fn all_true(input: &[Value]) -> Result<Sequence, EvaluationError> {
    for v in input {
        if !singleton_boolean(v)? {
            return Ok(vec![Value::Boolean(false)]);
        }
    }
    Ok(vec![Value::Boolean(true)])
}

pub fn any_true(input: &[Value]) -> Result<Sequence, EvaluationError> {
    for v in input {
        if singleton_boolean(v)? {
            return Ok(vec![Value::Boolean(true)]);
        }
    }
    Ok(vec![Value::Boolean(false)])
}

pub fn all_false(input: &[Value]) -> Result<Sequence, EvaluationError> {
    for v in input {
        if singleton_boolean(v)? {
            return Ok(vec![Value::Boolean(false)]);
        }
    }
    Ok(vec![Value::Boolean(true)])
}

pub fn any_false(input: &[Value]) -> Result<Sequence, EvaluationError> {
    for v in input {
        if !singleton_boolean(v)? {
            return Ok(vec![Value::Boolean(true)]);
        }
    }
    Ok(vec![Value::Boolean(false)])
}

/// `not()` (function form): the same truth table as the `not` keyword, just
/// invoked with call syntax rather than prefix syntax.
pub fn not(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(Value::Boolean(b)) => Ok(vec![Value::Boolean(!b)]),
        Some(_) => Err(EvaluationError::type_error("not() requires a Boolean")),
    }
}

/// Runs `expr` once per input element under a fresh `$this`/`$index` frame,
/// concatenating the (possibly multi-element) results in order — the shared
/// shape behind `where`/`select`/`all`/`exists`.
fn map_each(evaluator: &Evaluator, expr: &Expr, input: &[Value], context: &Context) -> Result<Vec<Sequence>, EvaluationError> {
    let mut results = Vec::with_capacity(input.len());
    for (i, item) in input.iter().enumerate() {
        let iter_context = context.with_iterator(item.clone(), i as i64);
        results.push(evaluator.evaluate(expr, vec![item.clone()], &iter_context)?);
    }
    Ok(results)
}

fn criterion_is_true(seq: Sequence) -> Result<bool, EvaluationError> {
    match to_singleton(seq)? {
        None => Ok(false),
        Some(Value::Boolean(b)) => Ok(b),
        Some(_) => Err(EvaluationError::type_error("criteria expression must evaluate to a Boolean")),
    }
}

pub fn where_fn(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let mut result = Sequence::new();
    for (i, item) in input.into_iter().enumerate() {
        let iter_context = context.with_iterator(item.clone(), i as i64);
        if criterion_is_true(evaluator.evaluate(&args[0], vec![item.clone()], &iter_context)?)? {
            result.push(item);
        }
    }
    Ok(result)
}

pub fn select(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let mut result = Sequence::new();
    for seq in map_each(evaluator, &args[0], &input, context)? {
        result.extend(seq);
    }
    Ok(result)
}

pub fn all(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    for seq in map_each(evaluator, &args[0], &input, context)? {
        if !criterion_is_true(seq)? {
            return Ok(vec![Value::Boolean(false)]);
        }
    }
    Ok(vec![Value::Boolean(true)])
}

pub fn exists(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    match args.first() {
        None => Ok(vec![Value::Boolean(!input.is_empty())]),
        Some(criteria) => {
            for seq in map_each(evaluator, criteria, &input, context)? {
                if criterion_is_true(seq)? {
                    return Ok(vec![Value::Boolean(true)]);
                }
            }
            Ok(vec![Value::Boolean(false)])
        }
    }
}

/// `repeat(projection)`: repeatedly applies `projection` to the frontier of
/// newly produced items until it stops producing anything not already seen,
/// per FHIRPath's fixed-point semantics. The starting collection itself is
/// never included in the result, only what `projection` produces.
pub fn repeat(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let expr = &args[0];
    let mut seen: Sequence = input.clone();
    let mut result = Sequence::new();
    let mut frontier = input;
    while !frontier.is_empty() {
        let mut next_frontier = Sequence::new();
        for seq in map_each(evaluator, expr, &frontier, context)? {
            for item in seq {
                if !contains_value(&seen, &item) {
                    seen.push(item.clone());
                    result.push(item.clone());
                    next_frontier.push(item);
                }
            }
        }
        frontier = next_frontier;
    }
    Ok(result)
}

/// `children()`: every immediate child value of every `Value::Node` in the
/// input, in field-declaration order, flattening arrays one level — the
/// direct single-step version of `descendants()`.
pub fn children(input: &[Value]) -> Sequence {
    let mut result = Sequence::new();
    for value in input {
        if let Value::Node(node) = value {
            if let Some(obj) = node.as_object() {
                for field in obj.values() {
                    match field {
                        serde_json::Value::Array(items) => {
                            for item in items {
                                result.extend(Value::from_json(std::rc::Rc::new(item.clone())));
                            }
                        }
                        other => result.extend(Value::from_json(std::rc::Rc::new(other.clone()))),
                    }
                }
            }
        }
    }
    result
}

/// `descendants()`: `children()` applied repeatedly until it stops producing
/// anything new — equivalent to `repeat(children())`.
pub fn descendants(input: &[Value]) -> Sequence {
    let mut seen: Sequence = input.to_vec();
    let mut result = Sequence::new();
    let mut frontier = input.to_vec();
    while !frontier.is_empty() {
        let next = children(&frontier);
        let mut next_frontier = Sequence::new();
        for item in next {
            if !seen.iter().any(|existing| existing == &item) {
                seen.push(item.clone());
                result.push(item.clone());
                next_frontier.push(item);
            }
        }
        frontier = next_frontier;
    }
    result
}

pub fn iif(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let condition = to_tri_state_for_iif(evaluator.evaluate(&args[0], input.clone(), context)?)?;
    match condition {
        Some(true) => evaluator.evaluate(&args[1], input, context),
        Some(false) | None => match args.get(2) {
            Some(else_expr) => evaluator.evaluate(else_expr, input, context),
            None => Ok(Sequence::new()),
        },
    }
}

fn to_tri_state_for_iif(seq: Sequence) -> Result<Option<bool>, EvaluationError> {
    match to_singleton(seq)? {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(b)),
        Some(_) => Err(EvaluationError::type_error("iif() criterion must evaluate to a Boolean")),
    }
}

/// `trace(name[, projection])`: records `name` and the (optionally
/// projected) sequence to the context's trace log as a side effect, and
/// returns the original input completely unchanged — tracing never affects
/// evaluation.
pub fn trace(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let name = match to_singleton(evaluator.evaluate(&args[0], input.clone(), context)?)? {
        Some(Value::String(s)) => s,
        Some(_) => return Err(EvaluationError::type_error("trace() name must be a String")),
        None => return Err(EvaluationError::invalid_argument("trace() requires a name argument")),
    };
    let traced = match args.get(1) {
        Some(projection) => select(evaluator, std::slice::from_ref(projection), input.clone(), context)?,
        None => input.clone(),
    };
    context.record_trace(name, traced);
    Ok(input)
}

/// `defineVariable(name[, value])`: binds `%name` to `value` (or to the
/// current input if `value` is omitted) for the rest of the evaluation, and
/// passes the input through unchanged.
pub fn define_variable(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let name = match to_singleton(evaluator.evaluate(&args[0], input.clone(), context)?)? {
        Some(Value::String(s)) => s,
        Some(_) => return Err(EvaluationError::type_error("defineVariable() name must be a String")),
        None => return Err(EvaluationError::invalid_argument("defineVariable() requires a name argument")),
    };
    let value = match args.get(1) {
        Some(value_expr) => evaluator.evaluate(value_expr, input.clone(), context)?,
        None => input.clone(),
    };
    context.with_variable(name, value);
    Ok(input)
}

/// `aggregate(aggregator[, init])`: threads `$total` through the input,
/// evaluating `aggregator` once per element with `$this` bound to the
/// element and `$total` bound to the accumulator so far; `aggregator`'s
/// result becomes the new `$total`. The final `$total` is the result.
pub fn aggregate(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let aggregator = &args[0];
    let mut total = match args.get(1) {
        Some(init_expr) => evaluator.evaluate(init_expr, input.clone(), context)?,
        None => Sequence::new(),
    };
    for (i, item) in input.into_iter().enumerate() {
        let iter_context = context.with_total(total.clone()).with_iterator(item.clone(), i as i64);
        total = evaluator.evaluate(aggregator, vec![item], &iter_context)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::parser::{parse, ParserOptions};
    use std::collections::HashMap;

    fn eval_fn(src: &str, input: Sequence) -> Result<Sequence, EvaluationError> {
        let ast = parse(src, &ParserOptions::default()).expect("parses").ast;
        let context = Context::new(input.clone());
        let evaluator = Evaluator::new(HashMap::new());
        evaluator.evaluate(&ast, input, &context)
    }

    #[test]
    fn where_filters_by_iteration_context() {
        assert_eq!(
            eval_fn("(1 | 2 | 3).where($this > 1)", vec![]).unwrap(),
            vec![Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn select_projects_and_flattens() {
        assert_eq!(
            eval_fn("(1 | 2).select($this | $this)", vec![]).unwrap(),
            vec![Value::Integer(1), Value::Integer(1), Value::Integer(2), Value::Integer(2)]
        );
    }

    #[test]
    fn exists_without_criteria_checks_nonempty() {
        assert_eq!(eval_fn("{}.exists()", vec![]).unwrap(), vec![Value::Boolean(false)]);
        assert_eq!(eval_fn("(1).exists()", vec![]).unwrap(), vec![Value::Boolean(true)]);
    }

    #[test]
    fn skip_and_take_slice_by_position() {
        assert_eq!(eval_fn("(1 | 2 | 3).skip(1)", vec![]).unwrap(), vec![Value::Integer(2), Value::Integer(3)]);
        assert_eq!(eval_fn("(1 | 2 | 3).take(2)", vec![]).unwrap(), vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn distinct_dedups_preserving_first_occurrence() {
        assert_eq!(eval_fn("(1 | 1 | 2).distinct()", vec![]).unwrap(), vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn aggregate_sums_with_total() {
        assert_eq!(
            eval_fn("(1 | 2 | 3).aggregate($total + $this, 0)", vec![]).unwrap(),
            vec![Value::Integer(6)]
        );
    }

    #[test]
    fn define_variable_is_visible_to_later_steps() {
        assert_eq!(
            eval_fn("true.defineVariable('x', 5).select(%x + 1)", vec![]).unwrap(),
            vec![Value::Integer(6)]
        );
    }

    #[test]
    fn iif_picks_the_matching_branch() {
        assert_eq!(eval_fn("iif(true, 1, 2)", vec![]).unwrap(), vec![Value::Integer(1)]);
        assert_eq!(eval_fn("iif(false, 1, 2)", vec![]).unwrap(), vec![Value::Integer(2)]);
        assert_eq!(eval_fn("iif({}, 1, 2)", vec![]).unwrap(), vec![Value::Integer(2)]);
    }
}
