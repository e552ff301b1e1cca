//! Evaluation-time error type.
//!
//! Lex/parse errors (`fhirpath::diagnostics::Diagnostic`,
//! `fhirpath::parser::ParserError`) live in the `fhirpath` crate, since they
//! need the source/token types. Evaluation errors are defined here instead
//! because hosts that only exchange already-evaluated [`crate::Value`]s
//! still need to be able to match on why an evaluation failed.

use std::fmt;

/// Zero-based `{ line, column, offset }`, matching `fhirpath::source::Position`.
/// Kept here (rather than only in the parser crate) so an `EvaluationError`
/// can carry a position without this crate depending on the lexer/parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Stable, closed set of error codes exported for host error handling (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    TypeError,
    InvalidArgument,
    UndefinedVariable,
    InvalidOperation,
    InvalidArity,
    InvalidIndex,
    DivisionByZero,
    InvalidRegex,
    InvalidTypeSpecifier,
    SingletonEvaluationError,
    SemanticError,
    UnsupportedFunction,
    Other,
}

/// Comprehensive error type for FHIRPath evaluation failures.
///
/// Every variant carries a human-readable message; most evaluation sites
/// leave `position` unset and let the evaluator back-fill it from the AST
/// node being evaluated when the error unwinds past it (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationError {
    pub code: ErrorCode,
    pub message: String,
    pub position: Option<Position>,
}

impl EvaluationError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        EvaluationError { code, message: message.into(), position: None }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TypeError, message)
    }
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }
    pub fn undefined_variable(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorCode::UndefinedVariable, format!("Undefined variable: {name}"))
    }
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOperation, message)
    }
    pub fn invalid_arity(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArity, message)
    }
    pub fn invalid_index(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidIndex, message)
    }
    pub fn division_by_zero() -> Self {
        Self::new(ErrorCode::DivisionByZero, "Division by zero")
    }
    pub fn invalid_regex(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRegex, message)
    }
    pub fn invalid_type_specifier(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTypeSpecifier, message)
    }
    pub fn singleton_required(found: usize) -> Self {
        Self::new(
            ErrorCode::SingletonEvaluationError,
            format!("Expected a singleton, found a collection with {found} items"),
        )
    }
    pub fn semantic_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SemanticError, message)
    }
    pub fn unsupported_function(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorCode::UnsupportedFunction, format!("Unsupported function: {name}"))
    }
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Other, message)
    }

    /// Returns this error with `position` set, unless it already has one.
    /// Used by the evaluator to back-fill the node's position while
    /// unwinding (§4.6), never overwriting a more specific position set by
    /// the thrower.
    pub fn with_position_if_unset(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }
}

impl std::error::Error for EvaluationError {}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.code {
            ErrorCode::TypeError => "Type error",
            ErrorCode::InvalidArgument => "Invalid argument",
            ErrorCode::UndefinedVariable => "Undefined variable",
            ErrorCode::InvalidOperation => "Invalid operation",
            ErrorCode::InvalidArity => "Invalid arity",
            ErrorCode::InvalidIndex => "Invalid index",
            ErrorCode::DivisionByZero => "Division by zero",
            ErrorCode::InvalidRegex => "Invalid regex",
            ErrorCode::InvalidTypeSpecifier => "Invalid type specifier",
            ErrorCode::SingletonEvaluationError => "Singleton evaluation error",
            ErrorCode::SemanticError => "Semantic error",
            ErrorCode::UnsupportedFunction => "Unsupported function",
            ErrorCode::Other => "Evaluation error",
        };
        match self.position {
            Some(pos) => write!(f, "{label}: {} (at {}:{})", self.message, pos.line + 1, pos.column + 1),
            None => write!(f, "{label}: {}", self.message),
        }
    }
}
