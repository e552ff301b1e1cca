//! Diagnostic model and reporter (§4.8).

use crate::source::Range;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// Stable integer codes for parser/lexer diagnostics (§4.5, §6). Distinct
/// from `fhirpath_support::ErrorCode`, which covers evaluation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    SyntaxError,
    UnexpectedToken,
    ExpectedExpression,
    ExpectedIdentifier,
    InvalidOperator,
    UnclosedParenthesis,
    UnclosedBracket,
    UnclosedBrace,
    UnterminatedString,
    InvalidEscape,
    TrailingComma,
}

impl DiagnosticCode {
    pub fn as_u32(self) -> u32 {
        use DiagnosticCode::*;
        match self {
            SyntaxError => 1000,
            UnexpectedToken => 1001,
            ExpectedExpression => 1002,
            ExpectedIdentifier => 1003,
            InvalidOperator => 1004,
            UnclosedParenthesis => 1005,
            UnclosedBracket => 1006,
            UnclosedBrace => 1007,
            UnterminatedString => 1008,
            InvalidEscape => 1009,
            TrailingComma => 1010,
        }
    }
}

/// Fixed source string every diagnostic is tagged with, per §4.5.
pub const DIAGNOSTIC_SOURCE: &str = "fhirpath-parser";

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub range: Range,
    pub code: DiagnosticCode,
    pub message: String,
    pub source: &'static str,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, range: Range, message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Error, range, code, message: message.into(), source: DIAGNOSTIC_SOURCE }
    }

    pub fn warning(code: DiagnosticCode, range: Range, message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Warning, range, code, message: message.into(), source: DIAGNOSTIC_SOURCE }
    }
}

/// Parser-context tag used by [`Reporter`] to phrase an error in terms of
/// what was being parsed when the offending token was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserContext {
    Expression,
    CollectionLiteral,
    FunctionCall,
    IndexExpression,
    TypeCast,
    MembershipTest,
}

/// Produces a context-sensitive message for a diagnostic given the parser
/// context it was raised in and the offending token.
pub struct Reporter;

impl Reporter {
    pub fn message(context: ParserContext, code: DiagnosticCode, token_text: &str) -> String {
        let what = match context {
            ParserContext::Expression => "an expression",
            ParserContext::CollectionLiteral => "a collection literal",
            ParserContext::FunctionCall => "a function call argument",
            ParserContext::IndexExpression => "an index expression",
            ParserContext::TypeCast => "a type name",
            ParserContext::MembershipTest => "a type name",
        };
        match code {
            DiagnosticCode::ExpectedExpression => {
                format!("expected {what}, found '{token_text}'")
            }
            DiagnosticCode::ExpectedIdentifier => {
                format!("expected an identifier while parsing {what}, found '{token_text}'")
            }
            DiagnosticCode::UnexpectedToken => {
                format!("unexpected '{token_text}' while parsing {what}")
            }
            _ => format!("error while parsing {what} near '{token_text}'"),
        }
    }

    pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
        if token.kind == TokenKind::Eof {
            "<end of input>"
        } else {
            token.text(source)
        }
    }
}

/// Collects diagnostics during a parse, snapshots them on read, and enforces
/// an optional cap on *errors* (never warnings) per §4.5.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    max_errors: Option<usize>,
    error_count: usize,
}

impl DiagnosticCollector {
    pub fn new(max_errors: Option<usize>) -> Self {
        DiagnosticCollector { diagnostics: Vec::new(), max_errors, error_count: 0 }
    }

    /// Appends a diagnostic, dropping it silently if it is an error and the
    /// `max_errors` cap has already been reached.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            if let Some(max) = self.max_errors {
                if self.error_count >= max {
                    return;
                }
            }
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    /// A stable-ordered snapshot of every diagnostic collected so far, in
    /// the order they were raised.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.diagnostics.clone()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
