//! String functions (§4.2).

use fhirpath_support::{EvaluationError, Sequence, Value};

use crate::ast::Expr;
use crate::context::Context;
use crate::evaluator::{to_singleton, Evaluator};

fn as_string(v: &Value) -> Result<&str, EvaluationError> {
    match v {
        Value::String(s) => Ok(s),
        _ => Err(EvaluationError::type_error("expected a String")),
    }
}

fn eval_string_arg(evaluator: &Evaluator, expr: &Expr, input: Sequence, context: &Context) -> Result<Option<String>, EvaluationError> {
    match to_singleton(evaluator.evaluate(expr, input, context)?)? {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(EvaluationError::type_error("expected a String argument")),
    }
}

fn eval_integer_arg(evaluator: &Evaluator, expr: &Expr, input: Sequence, context: &Context) -> Result<Option<i64>, EvaluationError> {
    match to_singleton(evaluator.evaluate(expr, input, context)?)? {
        None => Ok(None),
        Some(Value::Integer(i)) => Ok(Some(i)),
        Some(_) => Err(EvaluationError::type_error("expected an Integer argument")),
    }
}

pub fn to_chars(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(as_string(&v)?.chars().map(|c| Value::String(c.to_string())).collect()),
    }
}

pub fn upper(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::String(as_string(&v)?.to_uppercase())]),
    }
}

pub fn lower(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::String(as_string(&v)?.to_lowercase())]),
    }
}

pub fn trim(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::String(as_string(&v)?.trim().to_string())]),
    }
}

pub fn length(input: &[Value]) -> Result<Sequence, EvaluationError> {
    match to_singleton(input.to_vec())? {
        None => Ok(Sequence::new()),
        Some(v) => Ok(vec![Value::Integer(as_string(&v)?.chars().count() as i64)]),
    }
}

pub fn index_of(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let needle = args.first().ok_or_else(|| EvaluationError::invalid_arity("indexOf() requires one argument"))?;
    match (to_singleton(input.clone())?, eval_string_arg(evaluator, needle, input, context)?) {
        (None, _) | (_, None) => Ok(Sequence::new()),
        (Some(v), Some(sub)) => {
            let haystack = as_string(&v)?;
            let idx = haystack.find(sub.as_str()).map(|byte_idx| haystack[..byte_idx].chars().count() as i64).unwrap_or(-1);
            Ok(vec![Value::Integer(idx)])
        }
    }
}

pub fn substring(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let start_expr = args.first().ok_or_else(|| EvaluationError::invalid_arity("substring() requires a start argument"))?;
    let v = match to_singleton(input.clone())? {
        None => return Ok(Sequence::new()),
        Some(v) => v,
    };
    let s = as_string(&v)?;
    let chars: Vec<char> = s.chars().collect();
    let start = match eval_integer_arg(evaluator, start_expr, input.clone(), context)? {
        None => return Ok(Sequence::new()),
        Some(i) => i,
    };
    if start < 0 || start as usize >= chars.len() {
        return Ok(Sequence::new());
    }
    let length = match args.get(1) {
        Some(len_expr) => match eval_integer_arg(evaluator, len_expr, input, context)? {
            None => return Ok(Sequence::new()),
            Some(n) => n.max(0) as usize,
        },
        None => chars.len() - start as usize,
    };
    let end = (start as usize + length).min(chars.len());
    Ok(vec![Value::String(chars[start as usize..end].iter().collect())])
}

pub fn starts_with(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let prefix_expr = args.first().ok_or_else(|| EvaluationError::invalid_arity("startsWith() requires one argument"))?;
    match (to_singleton(input.clone())?, eval_string_arg(evaluator, prefix_expr, input, context)?) {
        (None, _) | (_, None) => Ok(Sequence::new()),
        (Some(v), Some(prefix)) => Ok(vec![Value::Boolean(as_string(&v)?.starts_with(prefix.as_str()))]),
    }
}

pub fn ends_with(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let suffix_expr = args.first().ok_or_else(|| EvaluationError::invalid_arity("endsWith() requires one argument"))?;
    match (to_singleton(input.clone())?, eval_string_arg(evaluator, suffix_expr, input, context)?) {
        (None, _) | (_, None) => Ok(Sequence::new()),
        (Some(v), Some(suffix)) => Ok(vec![Value::Boolean(as_string(&v)?.ends_with(suffix.as_str()))]),
    }
}

pub fn contains(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let needle_expr = args.first().ok_or_else(|| EvaluationError::invalid_arity("contains() requires one argument"))?;
    match (to_singleton(input.clone())?, eval_string_arg(evaluator, needle_expr, input, context)?) {
        (None, _) | (_, None) => Ok(Sequence::new()),
        (Some(v), Some(needle)) => Ok(vec![Value::Boolean(as_string(&v)?.contains(needle.as_str()))]),
    }
}

pub fn replace(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    if args.len() < 2 {
        return Err(EvaluationError::invalid_arity("replace() requires pattern and substitution arguments"));
    }
    let v = match to_singleton(input.clone())? {
        None => return Ok(Sequence::new()),
        Some(v) => v,
    };
    let pattern = match eval_string_arg(evaluator, &args[0], input.clone(), context)? {
        None => return Ok(Sequence::new()),
        Some(p) => p,
    };
    let substitution = match eval_string_arg(evaluator, &args[1], input, context)? {
        None => return Ok(Sequence::new()),
        Some(s) => s,
    };
    Ok(vec![Value::String(as_string(&v)?.replace(pattern.as_str(), &substitution))])
}

pub fn matches(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let pattern_expr = args.first().ok_or_else(|| EvaluationError::invalid_arity("matches() requires a pattern argument"))?;
    match (to_singleton(input.clone())?, eval_string_arg(evaluator, pattern_expr, input, context)?) {
        (None, _) | (_, None) => Ok(Sequence::new()),
        (Some(v), Some(pattern)) => {
            let re = regex::Regex::new(&pattern).map_err(|e| EvaluationError::invalid_regex(e.to_string()))?;
            Ok(vec![Value::Boolean(re.is_match(as_string(&v)?))])
        }
    }
}

pub fn replace_matches(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    if args.len() < 2 {
        return Err(EvaluationError::invalid_arity("replaceMatches() requires pattern and substitution arguments"));
    }
    let v = match to_singleton(input.clone())? {
        None => return Ok(Sequence::new()),
        Some(v) => v,
    };
    let pattern = match eval_string_arg(evaluator, &args[0], input.clone(), context)? {
        None => return Ok(Sequence::new()),
        Some(p) => p,
    };
    let substitution = match eval_string_arg(evaluator, &args[1], input, context)? {
        None => return Ok(Sequence::new()),
        Some(s) => s,
    };
    let re = regex::Regex::new(&pattern).map_err(|e| EvaluationError::invalid_regex(e.to_string()))?;
    // FHIRPath uses `$1`-style group references; Rust's `regex` crate uses the
    // same syntax for `replace_all`, so the substitution template passes through.
    Ok(vec![Value::String(re.replace_all(as_string(&v)?, substitution.as_str()).into_owned())])
}

pub fn split(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let separator_expr = args.first().ok_or_else(|| EvaluationError::invalid_arity("split() requires a separator argument"))?;
    match (to_singleton(input.clone())?, eval_string_arg(evaluator, separator_expr, input, context)?) {
        (None, _) | (_, None) => Ok(Sequence::new()),
        (Some(v), Some(sep)) => Ok(as_string(&v)?.split(sep.as_str()).map(|s| Value::String(s.to_string())).collect()),
    }
}

pub fn join(evaluator: &Evaluator, args: &[Expr], input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
    let separator = match args.first() {
        Some(expr) => eval_string_arg(evaluator, expr, input.clone(), context)?.unwrap_or_default(),
        None => String::new(),
    };
    let mut parts = Vec::with_capacity(input.len());
    for v in &input {
        parts.push(as_string(v)?.to_string());
    }
    Ok(vec![Value::String(parts.join(&separator))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_chars_splits_on_unicode_scalar_values() {
        assert_eq!(
            to_chars(&[Value::String("ab".into())]).unwrap(),
            vec![Value::String("a".into()), Value::String("b".into())]
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert_eq!(length(&[Value::String("héllo".into())]).unwrap(), vec![Value::Integer(5)]);
    }
}
