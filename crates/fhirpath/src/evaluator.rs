//! Tree-walking evaluator (§4.6).
//!
//! Every expression evaluates a [`crate::ast::Expr`] against a current
//! `input` sequence and [`Context`] to a result [`Sequence`] — there is no
//! separate "scalar" evaluation path; singleton rules are applied at the
//! operators and functions that require them, never globally.

use std::collections::HashMap;
use std::rc::Rc;

use fhirpath_support::{EvaluationError, Sequence, Value};
use rust_decimal::Decimal;

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp, Variable, VariableKind};
use crate::context::Context;
use crate::functions;
use crate::source::Position;

/// A host-registered custom function (§6 `with_custom_function`). Receives
/// the already-evaluated argument sequences (custom functions are always
/// `Value`-kind at every position) and the context the call was made in.
pub type CustomFunction = Rc<dyn Fn(&Context, &[Sequence]) -> Result<Sequence, EvaluationError>>;

pub struct Evaluator {
    pub(crate) custom_functions: HashMap<String, CustomFunction>,
}

impl Evaluator {
    pub fn new(custom_functions: HashMap<String, CustomFunction>) -> Self {
        Evaluator { custom_functions }
    }

    pub fn custom_function(&self, name: &str) -> Option<&CustomFunction> {
        self.custom_functions.get(name)
    }

    pub fn evaluate(&self, expr: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        tracing::trace!(node = ?expr.kind_name(), "evaluating expression node");
        self.eval_kind(&expr.kind, input, context).map_err(|e| e.with_position_if_unset(to_error_position(expr.start)))
    }

    fn eval_kind(&self, kind: &ExprKind, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        match kind {
            ExprKind::Literal(lit) => Ok(lit.to_value().into_iter().collect()),
            ExprKind::Identifier(name) => Ok(navigate_members(&input, name)),
            ExprKind::TypeOrIdentifier(name) => Ok(navigate_members(&input, name)),
            ExprKind::Variable(var) => self.eval_variable(var, context),
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right, input, context),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, input, context),
            ExprKind::Union { operands } => {
                let mut result = Sequence::new();
                for operand in operands {
                    result.extend(self.evaluate(operand, input.clone(), context)?);
                }
                Ok(dedup_preserve_order(result))
            }
            ExprKind::Function { name, args } => functions::dispatch(self, name, args, input, context),
            ExprKind::Index { target, index } => self.eval_index(target, index, input, context),
            ExprKind::Collection { items } => {
                let mut result = Sequence::new();
                for item in items {
                    result.extend(self.evaluate(item, input.clone(), context)?);
                }
                Ok(result)
            }
            ExprKind::MembershipTest { target, type_ref } => self.eval_is(target, type_ref, input, context),
            ExprKind::TypeCast { target, type_ref } => self.eval_as(target, type_ref, input, context),
            ExprKind::TypeReference(_) => {
                Err(EvaluationError::semantic_error("a type name cannot be evaluated as a value on its own"))
            }
            ExprKind::Error { message } => Err(EvaluationError::semantic_error(format!("syntax error: {message}"))),
            ExprKind::Incomplete => Err(EvaluationError::semantic_error("incomplete expression")),
        }
    }

    fn eval_variable(&self, var: &Variable, context: &Context) -> Result<Sequence, EvaluationError> {
        match var {
            Variable::Special(VariableKind::This) => Ok(context.this()),
            Variable::Special(VariableKind::Index) => {
                Ok(context.index().map(|i| vec![Value::Integer(i)]).unwrap_or_default())
            }
            Variable::Special(VariableKind::Total) => Ok(context.total().unwrap_or_default()),
            Variable::External(name) => {
                context.get_variable(name).ok_or_else(|| EvaluationError::undefined_variable(name.clone()))
            }
        }
    }

    fn eval_index(&self, target: &Expr, index: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        let target_seq = self.evaluate(target, input.clone(), context)?;
        let index_seq = self.evaluate(index, input, context)?;
        let idx = match to_singleton(index_seq)? {
            None => return Ok(Sequence::new()),
            Some(Value::Integer(i)) => i,
            Some(_) => return Err(EvaluationError::type_error("index expression must be an Integer")),
        };
        if idx < 0 {
            return Ok(Sequence::new());
        }
        Ok(target_seq.into_iter().nth(idx as usize).into_iter().collect())
    }

    fn eval_is(&self, target: &Expr, type_ref: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        let type_name = match &type_ref.kind {
            ExprKind::TypeReference(t) => t,
            _ => return Err(EvaluationError::invalid_type_specifier("expected a type name after 'is'")),
        };
        let target_seq = self.evaluate(target, input, context)?;
        match to_singleton(target_seq)? {
            None => Ok(Sequence::new()),
            Some(v) => Ok(vec![Value::Boolean(functions::type_ops::value_is_type(&v, type_name))]),
        }
    }

    fn eval_as(&self, target: &Expr, type_ref: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        let type_name = match &type_ref.kind {
            ExprKind::TypeReference(t) => t,
            _ => return Err(EvaluationError::invalid_type_specifier("expected a type name after 'as'")),
        };
        let target_seq = self.evaluate(target, input, context)?;
        match to_singleton(target_seq)? {
            None => Ok(Sequence::new()),
            Some(v) => {
                if functions::type_ops::value_is_type(&v, type_name) {
                    Ok(vec![v])
                } else {
                    Ok(Sequence::new())
                }
            }
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        let seq = self.evaluate(operand, input, context)?;
        match to_singleton(seq)? {
            None => Ok(Sequence::new()),
            Some(v) => {
                let result = match (op, &v) {
                    (UnaryOp::Plus, Value::Integer(_) | Value::Decimal(_)) => v,
                    (UnaryOp::Minus, Value::Integer(i)) => Value::Integer(
                        i.checked_neg().ok_or_else(|| EvaluationError::invalid_operation("integer negation overflowed"))?,
                    ),
                    (UnaryOp::Minus, Value::Decimal(d)) => Value::Decimal(-*d),
                    _ => return Err(EvaluationError::type_error("unary +/- requires a numeric operand")),
                };
                Ok(vec![result])
            }
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        match op {
            BinaryOp::Path => self.eval_path(left, right, input, context),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Implies => {
                self.eval_logic(op, left, right, input, context)
            }
            BinaryOp::Concat => {
                let l = self.evaluate(left, input.clone(), context)?;
                let r = self.evaluate(right, input, context)?;
                Ok(vec![Value::String(format!("{}{}", to_concat_string(l)?, to_concat_string(r)?))])
            }
            BinaryOp::Eq | BinaryOp::Neq => {
                let l = self.evaluate(left, input.clone(), context)?;
                let r = self.evaluate(right, input, context)?;
                if l.is_empty() || r.is_empty() {
                    return Ok(Sequence::new());
                }
                let equal = functions::type_ops::sequence_equals(&l, &r)?;
                Ok(equal.map(|eq| vec![Value::Boolean(if op == BinaryOp::Eq { eq } else { !eq })]).unwrap_or_default())
            }
            BinaryOp::Equivalent | BinaryOp::NotEquivalent => {
                let l = self.evaluate(left, input.clone(), context)?;
                let r = self.evaluate(right, input, context)?;
                let equiv = functions::type_ops::sequence_equivalent(&l, &r);
                Ok(vec![Value::Boolean(if op == BinaryOp::Equivalent { equiv } else { !equiv })])
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Lte | BinaryOp::Gte => {
                let l = to_singleton(self.evaluate(left, input.clone(), context)?)?;
                let r = to_singleton(self.evaluate(right, input, context)?)?;
                match (l, r) {
                    (None, _) | (_, None) => Ok(Sequence::new()),
                    (Some(a), Some(b)) => {
                        let ordering = functions::type_ops::compare_values(&a, &b)?;
                        let result = match op {
                            BinaryOp::Lt => ordering.is_lt(),
                            BinaryOp::Gt => ordering.is_gt(),
                            BinaryOp::Lte => ordering.is_le(),
                            BinaryOp::Gte => ordering.is_ge(),
                            _ => unreachable!(),
                        };
                        Ok(vec![Value::Boolean(result)])
                    }
                }
            }
            BinaryOp::In | BinaryOp::ContainsOp => {
                let (item_expr, collection_expr) = if op == BinaryOp::In { (left, right) } else { (right, left) };
                let item = to_singleton(self.evaluate(item_expr, input.clone(), context)?)?;
                let collection = self.evaluate(collection_expr, input, context)?;
                match item {
                    None => Ok(Sequence::new()),
                    Some(v) => {
                        let found = collection.iter().any(|c| functions::type_ops::value_equals(c, &v) == Some(true));
                        Ok(vec![Value::Boolean(found)])
                    }
                }
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::IntDiv | BinaryOp::Mod => {
                let l = to_singleton(self.evaluate(left, input.clone(), context)?)?;
                let r = to_singleton(self.evaluate(right, input, context)?)?;
                match (l, r) {
                    (None, _) | (_, None) => Ok(Sequence::new()),
                    (Some(a), Some(b)) => Ok(arithmetic(op, &a, &b)?.into_iter().collect()),
                }
            }
        }
    }

    fn eval_path(&self, left: &Expr, right: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        let left_seq = self.evaluate(left, input, context)?;
        let mut result = Sequence::new();
        for (i, item) in left_seq.into_iter().enumerate() {
            let iter_context = context.with_iterator(item.clone(), i as i64);
            result.extend(self.evaluate(right, vec![item], &iter_context)?);
        }
        Ok(result)
    }

    fn eval_logic(&self, op: BinaryOp, left: &Expr, right: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        let l = to_tri_state(self.evaluate(left, input.clone(), context)?)?;

        // `and`/`or` short-circuit: a known-false `and` or known-true `or`
        // decides the result without evaluating the right-hand side, per
        // three-valued logic (§4.6) — not just as an optimization, since the
        // right side may be expensive or reference things that don't apply.
        match (op, l) {
            (BinaryOp::And, Some(false)) => return Ok(vec![Value::Boolean(false)]),
            (BinaryOp::Or, Some(true)) => return Ok(vec![Value::Boolean(true)]),
            _ => {}
        }

        let r = to_tri_state(self.evaluate(right, input, context)?)?;
        let result = match op {
            BinaryOp::And => tri_and(l, r),
            BinaryOp::Or => tri_or(l, r),
            BinaryOp::Xor => tri_xor(l, r),
            BinaryOp::Implies => tri_implies(l, r),
            _ => unreachable!(),
        };
        Ok(result.map(|b| vec![Value::Boolean(b)]).unwrap_or_default())
    }
}

fn to_error_position(pos: Position) -> fhirpath_support::Position {
    fhirpath_support::Position { line: pos.line, column: pos.column, offset: pos.offset }
}

/// Applies the §3 singleton-conversion rule: 0 items → `None`, 1 item →
/// `Some`, 2+ items → an error. Used by every operator/function that needs
/// "the" value rather than a collection.
pub fn to_singleton(seq: Sequence) -> Result<Option<Value>, EvaluationError> {
    match seq.len() {
        0 => Ok(None),
        1 => Ok(seq.into_iter().next()),
        n => Err(EvaluationError::singleton_required(n)),
    }
}

fn to_tri_state(seq: Sequence) -> Result<Option<bool>, EvaluationError> {
    match to_singleton(seq)? {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(b)),
        Some(_) => Err(EvaluationError::type_error("boolean operator operand must be a Boolean")),
    }
}

fn tri_and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn tri_or(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn tri_xor(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x != y),
        _ => None,
    }
}

fn tri_implies(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) => Some(true),
        (_, Some(true)) => Some(true),
        (None, _) => None,
        (Some(true), None) => None,
        (Some(true), Some(false)) => Some(false),
    }
}

fn to_concat_string(seq: Sequence) -> Result<String, EvaluationError> {
    match to_singleton(seq)? {
        None => Ok(String::new()),
        Some(v) => functions::conversion::value_to_display_string(&v),
    }
}

/// `None` means the operation yields the empty sequence rather than a value
/// — only `div`/`mod` by zero take this path; `/` by zero on Decimal operands
/// is always an evaluation error, never empty (§8 boundary behaviour: a
/// zero divisor is a silent empty result for the integer-truncating
/// operators, but a hard error for true decimal division).
fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Option<Value>, EvaluationError> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        if op == BinaryOp::Add {
            return Ok(Some(Value::String(format!("{x}{y}"))));
        }
    }
    let (an, a_is_int) = as_decimal(a).ok_or_else(|| EvaluationError::type_error("arithmetic requires numeric operands"))?;
    let (bn, b_is_int) = as_decimal(b).ok_or_else(|| EvaluationError::type_error("arithmetic requires numeric operands"))?;
    let both_int = a_is_int && b_is_int;

    match op {
        BinaryOp::Add => Ok(Some(numeric_result(an + bn, both_int))),
        BinaryOp::Sub => Ok(Some(numeric_result(an - bn, both_int))),
        BinaryOp::Mul => Ok(Some(numeric_result(an * bn, both_int))),
        BinaryOp::Div => {
            if bn.is_zero() {
                return Err(EvaluationError::division_by_zero());
            }
            Ok(Some(Value::Decimal(an / bn)))
        }
        BinaryOp::IntDiv => {
            if bn.is_zero() {
                return Ok(None);
            }
            let q = (an / bn).trunc();
            Ok(Some(Value::Integer(
                q.try_into().map_err(|_| EvaluationError::invalid_operation("div result out of range"))?,
            )))
        }
        BinaryOp::Mod => {
            if bn.is_zero() {
                return Ok(None);
            }
            Ok(Some(numeric_result(an % bn, both_int)))
        }
        _ => unreachable!("arithmetic() only called for arithmetic ops"),
    }
}

fn as_decimal(v: &Value) -> Option<(Decimal, bool)> {
    match v {
        Value::Integer(i) => Some((Decimal::from(*i), true)),
        Value::Decimal(d) => Some((*d, false)),
        _ => None,
    }
}

fn numeric_result(d: Decimal, both_int: bool) -> Value {
    if both_int {
        if let Ok(i) = i64::try_from(d) {
            return Value::Integer(i);
        }
    }
    Value::Decimal(d)
}

/// Navigates a member named `name` off every `Value::Node` in `values`,
/// flattening the result (§3 invariant: no nested collections). Navigating
/// off a non-`Node` scalar, or a field that is absent, silently contributes
/// nothing — FHIRPath path navigation never errors on a missing member.
pub fn navigate_members(values: &[Value], name: &str) -> Sequence {
    let mut result = Sequence::new();
    for value in values {
        if let Value::Node(node) = value {
            if let Some(field) = node.as_object().and_then(|obj| obj.get(name)) {
                match field {
                    serde_json::Value::Array(items) => {
                        for item in items {
                            result.extend(Value::from_json(Rc::new(item.clone())));
                        }
                    }
                    other => result.extend(Value::from_json(Rc::new(other.clone()))),
                }
            }
        }
    }
    result
}

fn dedup_preserve_order(seq: Sequence) -> Sequence {
    let mut result: Sequence = Vec::with_capacity(seq.len());
    for item in seq {
        if !result.iter().any(|existing| existing == &item) {
            result.push(item);
        }
    }
    result
}

impl ExprKind {
    fn kind_name(&self) -> &'static str {
        match self {
            ExprKind::Literal(_) => "Literal",
            ExprKind::Identifier(_) => "Identifier",
            ExprKind::TypeOrIdentifier(_) => "TypeOrIdentifier",
            ExprKind::Variable(_) => "Variable",
            ExprKind::Binary { .. } => "Binary",
            ExprKind::Unary { .. } => "Unary",
            ExprKind::Union { .. } => "Union",
            ExprKind::Function { .. } => "Function",
            ExprKind::Index { .. } => "Index",
            ExprKind::Collection { .. } => "Collection",
            ExprKind::MembershipTest { .. } => "MembershipTest",
            ExprKind::TypeCast { .. } => "TypeCast",
            ExprKind::TypeReference(_) => "TypeReference",
            ExprKind::Error { .. } => "Error",
            ExprKind::Incomplete => "Incomplete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, ParserOptions};

    fn eval(src: &str, input: Sequence) -> Result<Sequence, EvaluationError> {
        let ast = parse(src, &ParserOptions::default()).expect("parses").ast;
        let context = Context::new(input.clone());
        let evaluator = Evaluator::new(HashMap::new());
        evaluator.evaluate(&ast, input, &context)
    }

    #[test]
    fn arithmetic_singleton_rule() {
        assert_eq!(eval("1 + 2", vec![]).unwrap(), vec![Value::Integer(3)]);
    }

    #[test]
    fn arithmetic_on_empty_propagates_empty() {
        assert_eq!(eval("{} + 1", vec![]).unwrap(), Sequence::new());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = eval("1 / 0", vec![]).unwrap_err();
        assert_eq!(err.code, fhirpath_support::ErrorCode::DivisionByZero);
    }

    #[test]
    fn integer_div_and_mod_by_zero_yield_empty() {
        assert_eq!(eval("1 div 0", vec![]).unwrap(), Sequence::new());
        assert_eq!(eval("1 mod 0", vec![]).unwrap(), Sequence::new());
    }

    #[test]
    fn three_valued_and() {
        assert_eq!(eval("true and false", vec![]).unwrap(), vec![Value::Boolean(false)]);
        assert_eq!(eval("false and {}", vec![]).unwrap(), vec![Value::Boolean(false)]);
        assert_eq!(eval("true and {}", vec![]).unwrap(), Sequence::new());
    }

    #[test]
    fn union_flattens_and_dedups() {
        assert_eq!(
            eval("1 | 2 | 1", vec![]).unwrap(),
            vec![Value::Integer(1), Value::Integer(2)]
        );
    }

    #[test]
    fn path_navigation_flattens_arrays() {
        let input = serde_json::json!({"name": [{"given": ["A"]}, {"given": ["B", "C"]}]});
        let seq = Value::input_to_sequence(input);
        assert_eq!(
            eval("name.given", seq).unwrap(),
            vec![Value::String("A".into()), Value::String("B".into()), Value::String("C".into())]
        );
    }

    #[test]
    fn equality_requires_equal_length_and_pairwise_equality() {
        assert_eq!(eval("(1 | 2) = (1 | 2)", vec![]).unwrap(), vec![Value::Boolean(true)]);
        assert_eq!(eval("(1 | 2) = (1 | 3)", vec![]).unwrap(), vec![Value::Boolean(false)]);
    }
}
