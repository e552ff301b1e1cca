//! # FHIRPath Expression Engine
//!
//! A complete implementation of the FHIRPath expression language: a
//! hand-written lexer and Pratt parser produce an AST (§4.2–§4.4), and a
//! tree-walking evaluator runs it against a JSON input tree (§4.6). The
//! whole pipeline operates on a single uniform value shape — there is no
//! separate "scalar" and "collection" API, every expression evaluates to a
//! [`Sequence`].
//!
//! ## Overview
//!
//! - **Navigation**: `Patient.name.family`
//! - **Filtering**: `telecom.where(system = 'email')`
//! - **Projection**: `name.given.first()`
//! - **Arithmetic and comparison**: `1 + 2 * 3 > 5`
//! - **Three-valued logic**: `active and deceased.exists()`
//! - **Type tests**: `value.is(Quantity)`, `value.ofType(String)`
//!
//! ## Architecture
//!
//! - [`lexer`]/[`token`]: turns source text into a token stream (§4.2)
//! - [`parser`]/[`ast`]: a Pratt operator-precedence parser (§4.4) producing
//!   [`ast::Expr`], with an error-recovery mode for partial ASTs (§4.8)
//! - [`registry`]: the single table of operator precedence/associativity and
//!   function arity/argument-kinds that both the parser and evaluator
//!   consult (§4.4, §4.6)
//! - [`evaluator`]/[`functions`]: the tree-walking evaluator and its function
//!   library (§4.6)
//! - [`context`]: the persistent `$this`/`$index`/`$total`/`%variable`
//!   evaluation environment (§4.7)
//!
//! ## Usage
//!
//! ```
//! use fhirpath::FhirPathEngine;
//!
//! let engine = FhirPathEngine::builder().build();
//! let input = serde_json::json!({"resourceType": "Patient", "active": true});
//! let result = engine.evaluate("active", input).unwrap();
//! assert_eq!(result, vec![fhirpath_support::Value::Boolean(true)]);
//! ```
//!
//! Custom functions and external variables are registered on the builder
//! before any expression is evaluated:
//!
//! ```
//! use fhirpath::FhirPathEngine;
//! use fhirpath_support::Value;
//!
//! let engine = FhirPathEngine::builder()
//!     .with_variable("threshold", vec![Value::Integer(10)])
//!     .build();
//! let result = engine.evaluate("%threshold + 1", serde_json::Value::Null).unwrap();
//! assert_eq!(result, vec![Value::Integer(11)]);
//! ```

pub mod ast;
pub mod context;
pub mod diagnostics;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod source;
pub mod token;

use std::collections::HashMap;
use std::rc::Rc;

pub use ast::Expr;
pub use context::Context;
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use evaluator::{CustomFunction, Evaluator};
pub use fhirpath_support::{ErrorCode, EvaluationError, Sequence, TypeName, Value};
pub use parser::{parse, ParseResult, ParserError, ParserOptions};
pub use registry::RegistrationError;

/// An optional collaborator a host can plug into [`FhirPathEngine`] to
/// answer type-system questions the evaluator itself has no model for
/// (§6 `with_model_provider`) — e.g. "is `Quantity` a subtype of
/// `Element`?" for a richer `is`/`as`/`ofType` than structural matching on
/// `resourceType` alone. Never consulted by the built-in evaluator today;
/// the seam exists so a host can layer that in without forking the engine.
pub trait ModelProvider {
    fn is_subtype_of(&self, type_name: &TypeName, of: &TypeName) -> bool;
}

/// Builder for [`FhirPathEngine`] (§6 "Evaluation interface"). Every
/// `with_*` method consumes and returns `self` so a host assembles the
/// engine it wants in one expression before evaluating anything.
#[derive(Default)]
pub struct EngineBuilder {
    variables: HashMap<String, Sequence>,
    custom_functions: HashMap<String, CustomFunction>,
    model_provider: Option<Rc<dyn ModelProvider>>,
    parser_options: ParserOptions,
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder::default()
    }

    /// Registers a host-supplied external constant, resolved as `%name`.
    /// Reserved names (`context`, `resource`, `rootResource`) are shadowed
    /// by the engine's own bindings at evaluation time, not rejected here.
    pub fn with_variable(mut self, name: impl Into<String>, value: Sequence) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Registers a custom function. Rejected up front if `name` collides
    /// with a built-in or is not a valid identifier (§4.4) — panics rather
    /// than silently dropping the registration, since a host that asks for
    /// a function it then can't call has a bug worth surfacing immediately.
    pub fn with_custom_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context, &[Sequence]) -> Result<Sequence, EvaluationError> + 'static,
    {
        let name = name.into();
        registry::REGISTRY.validate_custom_function(&name).unwrap_or_else(|e| panic!("{e}"));
        self.custom_functions.insert(name, Rc::new(f));
        self
    }

    pub fn with_model_provider(mut self, provider: Rc<dyn ModelProvider>) -> Self {
        self.model_provider = Some(provider);
        self
    }

    pub fn with_parser_options(mut self, options: ParserOptions) -> Self {
        self.parser_options = options;
        self
    }

    pub fn build(self) -> FhirPathEngine {
        FhirPathEngine {
            variables: Rc::new(self.variables),
            evaluator: Rc::new(Evaluator::new(self.custom_functions)),
            model_provider: self.model_provider,
            parser_options: self.parser_options,
        }
    }
}

/// The top-level entry point: parses and evaluates FHIRPath expressions
/// against a JSON input tree. Cheap to clone — everything it owns is
/// `Rc`-backed, so a host can hand out one per request without re-parsing
/// function tables or re-allocating the custom-function map.
#[derive(Clone)]
pub struct FhirPathEngine {
    variables: Rc<HashMap<String, Sequence>>,
    evaluator: Rc<Evaluator>,
    #[allow(dead_code)]
    model_provider: Option<Rc<dyn ModelProvider>>,
    parser_options: ParserOptions,
}

impl Default for FhirPathEngine {
    fn default() -> Self {
        EngineBuilder::new().build()
    }
}

impl FhirPathEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Parses `expression`, then evaluates it against `input` (a bare JSON
    /// value, normalized to a sequence per §3: `null` becomes empty, an
    /// array becomes one element per item, anything else becomes a single
    /// element). `$context`/`%resource`/`%rootResource` are all bound to
    /// `input` unchanged — there is no separate resource/root-resource
    /// distinction at this entry point; use [`FhirPathEngine::evaluate_ast`]
    /// directly with a custom [`Context`] for that.
    pub fn evaluate(&self, expression: &str, input: serde_json::Value) -> Result<Sequence, String> {
        let parsed = parse(expression, &self.parser_options).map_err(|e| e.to_string())?;
        let sequence = Value::input_to_sequence(input);
        let context = Context::new(sequence.clone()).with_env((*self.variables).clone());
        self.evaluator.evaluate(&parsed.ast, sequence, &context).map_err(|e| e.to_string())
    }

    /// Evaluates an already-parsed [`Expr`] against an explicit [`Context`]
    /// — the escape hatch for hosts that build their own context (e.g. to
    /// set `%resource`/`%rootResource` independently of the focus, or to
    /// re-evaluate the same AST against many inputs without re-parsing).
    pub fn evaluate_ast(&self, ast: &Expr, input: Sequence, context: &Context) -> Result<Sequence, EvaluationError> {
        self.evaluator.evaluate(ast, input, context)
    }

    pub fn parse(&self, expression: &str) -> Result<ParseResult, ParserError> {
        parse(expression, &self.parser_options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_a_simple_path() {
        let engine = FhirPathEngine::default();
        let input = serde_json::json!({"resourceType": "Patient", "active": true});
        assert_eq!(engine.evaluate("active", input).unwrap(), vec![Value::Boolean(true)]);
    }

    #[test]
    fn registered_variables_are_visible_as_percent_names() {
        let engine = FhirPathEngine::builder().with_variable("limit", vec![Value::Integer(5)]).build();
        assert_eq!(engine.evaluate("%limit + 1", serde_json::Value::Null).unwrap(), vec![Value::Integer(6)]);
    }

    #[test]
    fn custom_functions_are_callable_by_name() {
        let engine = FhirPathEngine::builder()
            .with_custom_function("double", |_ctx, args| {
                match args.first().and_then(|seq| seq.first()) {
                    Some(Value::Integer(i)) => Ok(vec![Value::Integer(i * 2)]),
                    _ => Ok(Sequence::new()),
                }
            })
            .build();
        assert_eq!(engine.evaluate("double(21)", serde_json::Value::Null).unwrap(), vec![Value::Integer(42)]);
    }

    #[test]
    #[should_panic]
    fn custom_function_cannot_shadow_a_builtin() {
        FhirPathEngine::builder().with_custom_function("where", |_ctx, _args| Ok(Sequence::new()));
    }

    #[test]
    fn null_input_normalizes_to_empty_sequence() {
        let engine = FhirPathEngine::default();
        assert_eq!(engine.evaluate("{}.count()", serde_json::Value::Null).unwrap(), vec![Value::Integer(0)]);
    }
}
