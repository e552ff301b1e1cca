//! Function dispatch (§4.4, §4.6).
//!
//! [`dispatch`] is the one place that turns a function name plus its
//! not-yet-evaluated argument expressions into a result: it looks up the
//! `FunctionSpec` in the registry, checks arity, and routes to whichever
//! submodule implements that name. `Value`-kind arguments are evaluated
//! against the *caller's* input before the callee ever sees them; callees
//! that take an `Expression`-kind argument (`where`, `select`, `all`, ...)
//! receive the unevaluated AST and run it once per element with a fresh
//! `$this`/`$index` context — see the submodules for that part. Individual
//! function modules stay free of this plumbing and only implement their own
//! semantics.

pub mod collections;
pub mod conversion;
pub mod datetime;
pub mod math;
pub mod string;
pub mod type_ops;

use fhirpath_support::{EvaluationError, Sequence, Value};

use crate::ast::Expr;
use crate::context::Context;
use crate::evaluator::Evaluator;
use crate::registry::REGISTRY;

pub fn dispatch(evaluator: &Evaluator, name: &str, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    if let Some(spec) = REGISTRY.function(name) {
        if !spec.accepts_arity(args.len()) {
            return Err(EvaluationError::invalid_arity(format!(
                "{name}() expects {}..={} arguments, found {}",
                spec.min_args,
                spec.max_args,
                args.len()
            )));
        }
        return call_builtin(evaluator, name, args, input, context);
    }
    if let Some(custom) = evaluator.custom_function(name) {
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(evaluator.evaluate(arg, input.clone(), context)?);
        }
        return custom(context, &evaluated);
    }
    Err(EvaluationError::unsupported_function(name))
}

fn call_builtin(evaluator: &Evaluator, name: &str, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    match name {
        "empty" => collections::empty(&input),
        "exists" => collections::exists(evaluator, args, input, context),
        "all" => collections::all(evaluator, args, input, context),
        "allTrue" => collections::all_true(&input),
        "anyTrue" => collections::any_true(&input),
        "allFalse" => collections::all_false(&input),
        "anyFalse" => collections::any_false(&input),
        "subsetOf" => collections::subset_of(evaluator, args, input, context),
        "supersetOf" => collections::superset_of(evaluator, args, input, context),
        "count" => collections::count(&input),
        "distinct" => collections::distinct(&input),
        "isDistinct" => collections::is_distinct(&input),
        "where" => collections::where_fn(evaluator, args, input, context),
        "select" => collections::select(evaluator, args, input, context),
        "repeat" => collections::repeat(evaluator, args, input, context),
        "ofType" => type_ops::of_type(args, input),
        "single" => collections::single(&input),
        "first" => collections::first(&input),
        "last" => collections::last(&input),
        "tail" => collections::tail(&input),
        "skip" => collections::skip(evaluator, args, input, context),
        "take" => collections::take(evaluator, args, input, context),
        "intersect" => collections::intersect(evaluator, args, input, context),
        "exclude" => collections::exclude(evaluator, args, input, context),
        "combine" => collections::combine(evaluator, args, input, context),
        "union" => collections::union(evaluator, args, input, context),
        "iif" => collections::iif(evaluator, args, input, context),
        "trace" => collections::trace(evaluator, args, input, context),
        "defineVariable" => collections::define_variable(evaluator, args, input, context),
        "aggregate" => collections::aggregate(evaluator, args, input, context),
        "not" => collections::not(&input),
        "is" => type_ops::is_function(args, input),
        "as" => type_ops::as_function(args, input),
        "type" => Ok(type_ops::type_of(&input)),
        "children" => Ok(collections::children(&input)),
        "descendants" => Ok(collections::descendants(&input)),
        "toBoolean" => conversion::to_boolean(&input),
        "convertsToBoolean" => conversion::converts_to_boolean(&input),
        "toInteger" => conversion::to_integer(&input),
        "convertsToInteger" => conversion::converts_to_integer(&input),
        "toDecimal" => conversion::to_decimal(&input),
        "convertsToDecimal" => conversion::converts_to_decimal(&input),
        "toString" => conversion::to_string_fn(&input),
        "convertsToString" => conversion::converts_to_string(&input),
        "toDate" => conversion::to_date(&input),
        "convertsToDate" => conversion::converts_to_date(&input),
        "toTime" => conversion::to_time(&input),
        "convertsToTime" => conversion::converts_to_time(&input),
        "toDateTime" => conversion::to_date_time(&input),
        "convertsToDateTime" => conversion::converts_to_date_time(&input),
        "toChars" => string::to_chars(&input),
        "indexOf" => string::index_of(evaluator, args, input, context),
        "substring" => string::substring(evaluator, args, input, context),
        "startsWith" => string::starts_with(evaluator, args, input, context),
        "endsWith" => string::ends_with(evaluator, args, input, context),
        "contains" => string::contains(evaluator, args, input, context),
        "upper" => string::upper(&input),
        "lower" => string::lower(&input),
        "replace" => string::replace(evaluator, args, input, context),
        "matches" => string::matches(evaluator, args, input, context),
        "replaceMatches" => string::replace_matches(evaluator, args, input, context),
        "length" => string::length(&input),
        "split" => string::split(evaluator, args, input, context),
        "join" => string::join(evaluator, args, input, context),
        "trim" => string::trim(&input),
        "abs" => math::abs(&input),
        "ceiling" => math::ceiling(&input),
        "floor" => math::floor(&input),
        "round" => math::round(evaluator, args, input, context),
        "sqrt" => math::sqrt(&input),
        "truncate" => math::truncate(&input),
        "exp" => math::exp(&input),
        "ln" => math::ln(&input),
        "log" => math::log(evaluator, args, input, context),
        "power" => math::power(evaluator, args, input, context),
        "lowBoundary" => math::low_boundary(evaluator, args, input, context),
        "highBoundary" => math::high_boundary(evaluator, args, input, context),
        "precision" => math::precision(&input),
        "today" => Ok(vec![Value::Date(datetime::today())]),
        "now" => Ok(vec![Value::DateTime(datetime::now())]),
        "timeOfDay" => Ok(vec![Value::Time(datetime::time_of_day())]),
        _ => Err(EvaluationError::unsupported_function(name)),
    }
}
