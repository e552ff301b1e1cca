//! Pratt parser (§4.3-§4.5).
//!
//! `.` and `[...]` are parsed as dedicated postfix productions rather than
//! through the generic binary-operator climb, since they always bind
//! tighter than anything in the precedence table and chain naturally left
//! to right. Everything else goes through [`Parser::parse_expression`],
//! which climbs the table in [`crate::registry`].

use std::fmt;

use fhirpath_support::{TypeName, Value};
use rust_decimal::Decimal;

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp, Variable, VariableKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollector, ParserContext, Reporter};
use crate::lexer::{LexError, Lexer};
use crate::registry::{precedence, OperatorForm, ParamKind, REGISTRY};
use crate::source::{Position, Range};
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Strict mode: the first diagnostic aborts parsing and `parse()`
    /// returns `Err`. When `false`, `parse()` always returns `Ok`, carrying
    /// whatever diagnostics were collected.
    pub throw_on_error: bool,
    /// When `true`, a malformed construct is synthesized as an `Error` or
    /// `Incomplete` node and parsing resumes after resynchronizing at the
    /// next `, ) ] } | and or` or end of input, so one mistake doesn't hide
    /// the rest. When `false`, parsing stops at the first problem.
    pub error_recovery: bool,
    pub track_ranges: bool,
    pub max_errors: Option<usize>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions { throw_on_error: true, error_recovery: false, track_ranges: false, max_errors: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub code: DiagnosticCode,
    pub range: Range,
    pub message: String,
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {}:{})", self.message, self.range.start.line + 1, self.range.start.column + 1)
    }
}

impl std::error::Error for ParserError {}

impl From<LexError> for ParserError {
    fn from(e: LexError) -> Self {
        ParserError { code: e.code, range: e.range, message: e.message }
    }
}

impl From<Diagnostic> for ParserError {
    fn from(d: Diagnostic) -> Self {
        ParserError { code: d.code, range: d.range, message: d.message }
    }
}

pub struct ParseResult {
    pub ast: Expr,
    pub diagnostics: Vec<Diagnostic>,
    pub has_errors: bool,
    /// `true` if the AST contains any synthesized `Error`/`Incomplete` node.
    pub is_partial: bool,
}

pub fn parse(source: &str, options: &ParserOptions) -> Result<ParseResult, ParserError> {
    let (tokens, lex_diagnostics) = Lexer::new(source, options.error_recovery).tokenize()?;

    let mut parser = Parser::new(source, tokens, options);
    for d in lex_diagnostics {
        parser.collector.push(d);
    }
    let ast = parser.run();
    let has_errors = parser.collector.has_errors();

    if options.throw_on_error && has_errors {
        let first = parser.collector.snapshot().into_iter().next().expect("has_errors implies non-empty");
        return Err(first.into());
    }

    Ok(ParseResult { ast, diagnostics: parser.collector.into_vec(), has_errors, is_partial: has_errors })
}

const SYNC_SET: &[TokenKind] = &[
    TokenKind::Comma,
    TokenKind::RParen,
    TokenKind::RBracket,
    TokenKind::RBrace,
    TokenKind::Pipe,
    TokenKind::And,
    TokenKind::Or,
    TokenKind::Eof,
];

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    options: &'a ParserOptions,
    collector: DiagnosticCollector,
    aborted: bool,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>, options: &'a ParserOptions) -> Self {
        Parser {
            source,
            tokens,
            pos: 0,
            options,
            collector: DiagnosticCollector::new(options.max_errors),
            aborted: false,
        }
    }

    fn peek(&self) -> Token {
        self.tokens[self.pos.min(self.tokens.len() - 1)].clone()
    }

    fn peek_at(&self, ahead: usize) -> Token {
        self.tokens[(self.pos + ahead).min(self.tokens.len() - 1)].clone()
    }

    fn advance(&mut self) -> Token {
        let token = self.peek();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn text_of(&self, token: &Token) -> &'a str {
        token.text(self.source)
    }

    fn maybe_range(&self, range: Range) -> Option<Range> {
        if self.options.track_ranges {
            Some(range)
        } else {
            None
        }
    }

    fn synchronize(&mut self) {
        while !SYNC_SET.contains(&self.peek().kind) {
            self.advance();
        }
    }

    fn incomplete_here(&self) -> Expr {
        let pos = self.peek().range.start;
        Expr::new(ExprKind::Incomplete, pos, None)
    }

    fn fail(&mut self, code: DiagnosticCode, range: Range, message: impl Into<String>) -> Expr {
        if self.aborted {
            return Expr::new(ExprKind::Incomplete, range.start, None);
        }
        let message = message.into();
        self.collector.push(Diagnostic::error(code, range, message.clone()));
        if self.options.error_recovery {
            self.synchronize();
            Expr::new(ExprKind::Error { message }, range.start, self.maybe_range(range))
        } else {
            self.aborted = true;
            Expr::new(ExprKind::Incomplete, range.start, self.maybe_range(range))
        }
    }

    fn expect(&mut self, kind: TokenKind, code: DiagnosticCode, message_if_missing: &str) -> Option<Token> {
        if self.peek().kind == kind {
            Some(self.advance())
        } else {
            let tok = self.peek();
            let text = Reporter::token_text(&tok, self.source).to_string();
            self.fail(code, tok.range, format!("{message_if_missing}, found '{text}'"));
            None
        }
    }

    fn run(&mut self) -> Expr {
        let expr = self.parse_expression(1);
        if !self.aborted && self.peek().kind != TokenKind::Eof {
            let tok = self.peek();
            let text = Reporter::token_text(&tok, self.source).to_string();
            self.fail(DiagnosticCode::UnexpectedToken, tok.range, format!("unexpected trailing '{text}'"));
        }
        expr
    }

    fn parse_expression(&mut self, min_precedence: u8) -> Expr {
        if self.aborted {
            return self.incomplete_here();
        }
        let mut left = self.parse_prefix();
        loop {
            if self.aborted {
                break;
            }
            let tok = self.peek();
            let spec = match REGISTRY.operator(tok.kind, OperatorForm::Infix) {
                Some(spec) if spec.precedence.0 >= min_precedence => spec,
                _ => break,
            };
            let start = left.start;
            self.advance();

            match tok.kind {
                TokenKind::Pipe => {
                    let mut operands = vec![left];
                    operands.push(self.parse_expression(precedence::UNION.0 + 1));
                    while self.peek().kind == TokenKind::Pipe {
                        self.advance();
                        operands.push(self.parse_expression(precedence::UNION.0 + 1));
                    }
                    let range = self.maybe_range(Range::new(start, self.peek().range.start));
                    left = Expr::new(ExprKind::Union { operands }, start, range);
                }
                TokenKind::Is => {
                    let type_ref = self.parse_type_specifier();
                    let range = self.maybe_range(Range::new(start, self.peek().range.start));
                    left = Expr::new(
                        ExprKind::MembershipTest { target: Box::new(left), type_ref: Box::new(type_ref) },
                        start,
                        range,
                    );
                }
                TokenKind::As => {
                    let type_ref = self.parse_type_specifier();
                    let range = self.maybe_range(Range::new(start, self.peek().range.start));
                    left = Expr::new(
                        ExprKind::TypeCast { target: Box::new(left), type_ref: Box::new(type_ref) },
                        start,
                        range,
                    );
                }
                _ => {
                    let op = spec.binary_op.unwrap_or_else(|| {
                        panic!("infix operator {:?} missing binary_op mapping", tok.kind)
                    });
                    let right = self.parse_expression(spec.precedence.0 + 1);
                    let range = self.maybe_range(Range::new(start, self.peek().range.start));
                    left = Expr::new(
                        ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
                        start,
                        range,
                    );
                }
            }
        }
        left
    }

    fn parse_prefix(&mut self) -> Expr {
        if self.aborted {
            return self.incomplete_here();
        }
        let tok = self.peek();
        let unary = match tok.kind {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            _ => None,
        };
        if let Some(op) = unary {
            let start = tok.range.start;
            self.advance();
            let operand = self.parse_expression(precedence::UNARY.0);
            let range = self.maybe_range(Range::new(start, self.peek().range.start));
            return Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, start, range);
        }
        let primary = self.parse_primary();
        self.parse_postfix(primary)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Expr {
        loop {
            if self.aborted {
                break;
            }
            match self.peek().kind {
                TokenKind::Dot => {
                    let dot_tok = self.advance();
                    let start = expr.start;
                    let member = self.parse_dotted_member(dot_tok.range);
                    let range = self.maybe_range(Range::new(start, self.peek().range.start));
                    expr = Expr::new(
                        ExprKind::Binary { op: BinaryOp::Path, left: Box::new(expr), right: Box::new(member) },
                        start,
                        range,
                    );
                }
                TokenKind::LBracket => {
                    let start = expr.start;
                    self.advance();
                    let index = self.parse_expression(1);
                    self.expect(TokenKind::RBracket, DiagnosticCode::UnclosedBracket, "expected ']' to close index expression");
                    let range = self.maybe_range(Range::new(start, self.peek().range.start));
                    expr = Expr::new(ExprKind::Index { target: Box::new(expr), index: Box::new(index) }, start, range);
                }
                _ => break,
            }
        }
        expr
    }

    /// The member immediately following a `.`: an identifier, a keyword
    /// reclassified as one (§4.5), or a function call. `dot_range` is the
    /// span of the `.` that was just consumed, so a stray extra `.` can be
    /// diagnosed over the full two-dot span rather than just its own token.
    fn parse_dotted_member(&mut self, dot_range: Range) -> Expr {
        if self.aborted {
            return self.incomplete_here();
        }
        let tok = self.peek();
        match tok.kind {
            TokenKind::Identifier | TokenKind::DelimitedIdentifier => self.parse_identifier_or_call(),
            TokenKind::Dot => {
                // `a..b`: a stray extra dot. §4.5: "the extra '.' is skipped in
                // recovery" — only the second dot is consumed, then the member
                // that follows it (`name`) is parsed normally, so the AST keeps
                // `Binary(DOT, a, name)` instead of losing `name` to synchronize().
                let span = Range::new(dot_range.start, tok.range.end);
                let message = "unexpected '..'; remove the extra '.'".to_string();
                self.collector.push(Diagnostic::error(DiagnosticCode::InvalidOperator, span, message));
                if self.options.error_recovery {
                    let extra_dot = self.advance();
                    self.parse_dotted_member(extra_dot.range)
                } else {
                    self.aborted = true;
                    Expr::new(ExprKind::Incomplete, span.start, self.maybe_range(span))
                }
            }
            k if k.reclassifies_after_dot() => self.parse_identifier_or_call(),
            _ => {
                let text = Reporter::token_text(&tok, self.source).to_string();
                self.fail(
                    DiagnosticCode::ExpectedIdentifier,
                    tok.range,
                    Reporter::message(ParserContext::Expression, DiagnosticCode::ExpectedIdentifier, &text),
                )
            }
        }
    }

    fn identifier_text(&self, tok: &Token) -> String {
        match tok.kind {
            TokenKind::DelimitedIdentifier => {
                let raw = self.text_of(tok);
                decode_delimited_identifier(raw)
            }
            _ => self.text_of(tok).to_string(),
        }
    }

    /// Parses a bare/delimited identifier, optionally followed by `(...)`
    /// turning it into a function call.
    fn parse_identifier_or_call(&mut self) -> Expr {
        let tok = self.advance();
        let start = tok.range.start;
        let is_delimited = tok.kind == TokenKind::DelimitedIdentifier;
        let name = self.identifier_text(&tok);

        if self.peek().kind == TokenKind::LParen {
            self.advance();
            let args = self.parse_arg_list(&name);
            self.expect(TokenKind::RParen, DiagnosticCode::UnclosedParenthesis, "expected ')' to close function call");
            let range = self.maybe_range(Range::new(start, self.peek().range.start));
            return Expr::new(ExprKind::Function { name, args }, start, range);
        }

        let range = self.maybe_range(tok.range);
        if !is_delimited && name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false) {
            Expr::new(ExprKind::TypeOrIdentifier(name), start, range)
        } else {
            Expr::new(ExprKind::Identifier(name), start, range)
        }
    }

    fn parse_arg_list(&mut self, function_name: &str) -> Vec<Expr> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            return args;
        }
        let spec = REGISTRY.function(function_name);
        loop {
            if self.aborted {
                break;
            }
            let index = args.len();
            let kind = spec.map(|s| s.param_kind(index)).unwrap_or(ParamKind::Value);
            let arg = if kind == ParamKind::TypeSpecifier {
                self.parse_type_specifier()
            } else {
                self.parse_expression(1)
            };
            args.push(arg);

            if self.peek().kind == TokenKind::Comma {
                self.advance();
                if self.peek().kind == TokenKind::RParen {
                    let tok = self.peek();
                    self.collector.push(Diagnostic::warning(
                        DiagnosticCode::TrailingComma,
                        tok.range,
                        "trailing comma before ')'",
                    ));
                    break;
                }
            } else {
                break;
            }
        }
        args
    }

    /// A dotted chain of names used as a type specifier, e.g. `FHIR.Patient`
    /// or the bare `Boolean` in `is Boolean`/`ofType(Boolean)`.
    fn parse_type_specifier(&mut self) -> Expr {
        if self.aborted {
            return self.incomplete_here();
        }
        let start_tok = self.peek();
        let start = start_tok.range.start;
        if !matches!(start_tok.kind, TokenKind::Identifier | TokenKind::DelimitedIdentifier)
            && !start_tok.kind.reclassifies_after_dot()
        {
            let text = Reporter::token_text(&start_tok, self.source).to_string();
            return self.fail(
                DiagnosticCode::ExpectedIdentifier,
                start_tok.range,
                format!("expected a type name, found '{text}'"),
            );
        }
        let first = self.advance();
        let mut text = self.identifier_text(&first);
        while self.peek().kind == TokenKind::Dot {
            let next = self.peek_at(1);
            if !matches!(next.kind, TokenKind::Identifier | TokenKind::DelimitedIdentifier)
                && !next.kind.reclassifies_after_dot()
            {
                break;
            }
            self.advance(); // '.'
            let seg = self.advance();
            text.push('.');
            text.push_str(&self.identifier_text(&seg));
        }
        let range = self.maybe_range(Range::new(start, self.peek().range.start));
        Expr::new(ExprKind::TypeReference(TypeName::parse(&text)), start, range)
    }

    fn parse_primary(&mut self) -> Expr {
        if self.aborted {
            return self.incomplete_here();
        }
        let tok = self.peek();
        let start = tok.range.start;
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let text = self.text_of(&tok);
                let literal = if text.contains('.') {
                    Literal::Decimal(text.parse::<Decimal>().unwrap_or(Decimal::ZERO))
                } else {
                    match text.parse::<i64>() {
                        Ok(i) => Literal::Integer(i),
                        Err(_) => Literal::Decimal(text.parse::<Decimal>().unwrap_or(Decimal::ZERO)),
                    }
                };
                Expr::new(ExprKind::Literal(literal), start, self.maybe_range(tok.range))
            }
            TokenKind::String => {
                self.advance();
                let raw = self.text_of(&tok);
                let decoded = decode_quoted_string(raw);
                Expr::new(ExprKind::Literal(Literal::String(decoded)), start, self.maybe_range(tok.range))
            }
            TokenKind::True => {
                self.advance();
                Expr::new(ExprKind::Literal(Literal::Boolean(true)), start, self.maybe_range(tok.range))
            }
            TokenKind::False => {
                self.advance();
                Expr::new(ExprKind::Literal(Literal::Boolean(false)), start, self.maybe_range(tok.range))
            }
            TokenKind::Null => {
                self.advance();
                Expr::new(ExprKind::Literal(Literal::Null), start, self.maybe_range(tok.range))
            }
            TokenKind::Date => {
                self.advance();
                let text = self.text_of(&tok).trim_start_matches('@').to_string();
                Expr::new(ExprKind::Literal(Literal::Date(text)), start, self.maybe_range(tok.range))
            }
            TokenKind::Time => {
                self.advance();
                let text = self.text_of(&tok).trim_start_matches('@').to_string();
                Expr::new(ExprKind::Literal(Literal::Time(text)), start, self.maybe_range(tok.range))
            }
            TokenKind::DateTime => {
                self.advance();
                let text = self.text_of(&tok).trim_start_matches('@').to_string();
                Expr::new(ExprKind::Literal(Literal::DateTime(text)), start, self.maybe_range(tok.range))
            }
            TokenKind::This => {
                self.advance();
                Expr::new(ExprKind::Variable(Variable::Special(VariableKind::This)), start, self.maybe_range(tok.range))
            }
            TokenKind::Index => {
                self.advance();
                Expr::new(ExprKind::Variable(Variable::Special(VariableKind::Index)), start, self.maybe_range(tok.range))
            }
            TokenKind::Total => {
                self.advance();
                Expr::new(ExprKind::Variable(Variable::Special(VariableKind::Total)), start, self.maybe_range(tok.range))
            }
            TokenKind::EnvVar => {
                self.advance();
                let name = decode_env_var(self.text_of(&tok));
                Expr::new(ExprKind::Variable(Variable::External(name)), start, self.maybe_range(tok.range))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(1);
                self.expect(TokenKind::RParen, DiagnosticCode::UnclosedParenthesis, "expected ')' to close parenthesized expression");
                inner
            }
            TokenKind::LBrace => {
                self.advance();
                let mut items = Vec::new();
                if self.peek().kind != TokenKind::RBrace {
                    loop {
                        if self.aborted {
                            break;
                        }
                        items.push(self.parse_expression(1));
                        if self.peek().kind == TokenKind::Comma {
                            self.advance();
                            if self.peek().kind == TokenKind::RBrace {
                                let tok = self.peek();
                                self.collector.push(Diagnostic::warning(
                                    DiagnosticCode::TrailingComma,
                                    tok.range,
                                    "trailing comma before '}'",
                                ));
                                break;
                            }
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBrace, DiagnosticCode::UnclosedBrace, "expected '}' to close collection literal");
                let range = self.maybe_range(Range::new(start, self.peek().range.start));
                Expr::new(ExprKind::Collection { items }, start, range)
            }
            TokenKind::Identifier | TokenKind::DelimitedIdentifier => self.parse_identifier_or_call(),
            k if k.reclassifies_after_dot() => self.parse_identifier_or_call(),
            TokenKind::Eq => self.fail(
                DiagnosticCode::ExpectedExpression,
                tok.range,
                "unexpected '='; did you mean a single '=' for equality?",
            ),
            _ => {
                let text = Reporter::token_text(&tok, self.source).to_string();
                self.fail(
                    DiagnosticCode::ExpectedExpression,
                    tok.range,
                    Reporter::message(ParserContext::Expression, DiagnosticCode::ExpectedExpression, &text),
                )
            }
        }
    }
}

/// Decodes the validated escapes inside a `'...'`/`"..."` literal's raw span
/// (quotes included). The lexer already rejected anything malformed, so
/// this never fails.
fn decode_quoted_string(raw: &str) -> String {
    let quote = raw.chars().next().unwrap_or('\'');
    let inner = &raw[1..raw.len().saturating_sub(1)];
    decode_escapes(inner, quote)
}

fn decode_escapes(inner: &str, quote: char) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('f') => out.push('\u{000C}'),
            Some('/') => out.push('/'),
            Some('\\') => out.push('\\'),
            Some(q) if q == quote => out.push(q),
            Some('u') => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                if let Ok(code) = u32::from_str_radix(&hex, 16) {
                    if let Some(ch) = char::from_u32(code) {
                        out.push(ch);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn decode_delimited_identifier(raw: &str) -> String {
    let inner = &raw[1..raw.len().saturating_sub(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// `%name` / `%'quoted name'` / `` %`quoted name` `` → the bare variable
/// name, with `%` and any quoting stripped.
fn decode_env_var(raw: &str) -> String {
    let body = &raw[1..]; // strip leading '%'
    if let Some(rest) = body.strip_prefix('\'') {
        decode_escapes(&rest[..rest.len().saturating_sub(1)], '\'')
    } else if body.starts_with('`') {
        decode_delimited_identifier(body)
    } else {
        body.to_string()
    }
}

/// Re-exported so hosts can build a literal [`Value`] from a parsed
/// [`Literal`] without reaching into `ast` directly.
pub fn literal_to_value(literal: &Literal) -> Option<Value> {
    literal.to_value()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Expr {
        parse(src, &ParserOptions::default()).expect("should parse").ast
    }

    #[test]
    fn simple_path_is_left_nested_binary_path() {
        let expr = parse_ok("Patient.name.given");
        match expr.kind {
            ExprKind::Binary { op: BinaryOp::Path, .. } => {}
            other => panic!("expected Path binary, got {other:?}"),
        }
    }

    #[test]
    fn precedence_additive_before_relational() {
        // `1 + 2 < 4` should parse as `(1 + 2) < 4`.
        let expr = parse_ok("1 + 2 < 4");
        match expr.kind {
            ExprKind::Binary { op: BinaryOp::Lt, left, .. } => match left.kind {
                ExprKind::Binary { op: BinaryOp::Add, .. } => {}
                other => panic!("expected Add on the left of Lt, got {other:?}"),
            },
            other => panic!("expected Lt at the top, got {other:?}"),
        }
    }

    #[test]
    fn union_flattens_to_one_node() {
        let expr = parse_ok("a | b | c");
        match expr.kind {
            ExprKind::Union { operands } => assert_eq!(operands.len(), 3),
            other => panic!("expected flattened Union, got {other:?}"),
        }
    }

    #[test]
    fn function_call_with_expression_argument() {
        let expr = parse_ok("name.where(use = 'official')");
        match expr.kind {
            ExprKind::Binary { op: BinaryOp::Path, right, .. } => match right.kind {
                ExprKind::Function { name, args } => {
                    assert_eq!(name, "where");
                    assert_eq!(args.len(), 1);
                }
                other => panic!("expected Function on the right of Path, got {other:?}"),
            },
            other => panic!("expected top-level Path, got {other:?}"),
        }
    }

    #[test]
    fn is_and_as_parse_type_references() {
        let expr = parse_ok("value is Quantity");
        match expr.kind {
            ExprKind::MembershipTest { type_ref, .. } => match type_ref.kind {
                ExprKind::TypeReference(name) => assert_eq!(name.name, "Quantity"),
                other => panic!("expected TypeReference, got {other:?}"),
            },
            other => panic!("expected MembershipTest, got {other:?}"),
        }

        let expr = parse_ok("value as FHIR.string");
        match expr.kind {
            ExprKind::TypeCast { type_ref, .. } => match type_ref.kind {
                ExprKind::TypeReference(name) => {
                    assert_eq!(name.namespace.as_deref(), Some("FHIR"));
                    assert_eq!(name.name, "string");
                }
                other => panic!("expected TypeReference, got {other:?}"),
            },
            other => panic!("expected TypeCast, got {other:?}"),
        }
    }

    #[test]
    fn type_operators_bind_tighter_than_additive() {
        // §4.4: `is`/`as` rank 4, tied with multiplicative and tighter than
        // additive (5), so `a + b is T` is `a + (b is T)`, not `(a + b) is T`.
        let expr = parse_ok("a + b is Quantity");
        match expr.kind {
            ExprKind::Binary { op: BinaryOp::Add, left, right } => {
                assert!(matches!(left.kind, ExprKind::Identifier(ref name) if name == "a"));
                match right.kind {
                    ExprKind::MembershipTest { target, type_ref } => {
                        assert!(matches!(target.kind, ExprKind::Identifier(ref name) if name == "b"));
                        assert!(matches!(type_ref.kind, ExprKind::TypeReference(ref t) if t.name == "Quantity"));
                    }
                    other => panic!("expected MembershipTest on the right of '+', got {other:?}"),
                }
            }
            other => panic!("expected top-level Binary(Add, a, (b is Quantity)), got {other:?}"),
        }
    }

    #[test]
    fn keyword_reclassifies_after_dot() {
        let expr = parse_ok("Patient.as");
        match expr.kind {
            ExprKind::Binary { op: BinaryOp::Path, right, .. } => match right.kind {
                ExprKind::Identifier(name) => assert_eq!(name, "as"),
                other => panic!("expected reclassified Identifier, got {other:?}"),
            },
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn strict_mode_throws_on_error() {
        let err = parse("Patient..name", &ParserOptions::default()).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::InvalidOperator);
    }

    #[test]
    fn recovery_mode_produces_partial_ast_with_diagnostics() {
        let options = ParserOptions { error_recovery: true, throw_on_error: false, ..ParserOptions::default() };
        let result = parse("Patient..name", &options).expect("recovery should not throw");
        assert!(result.is_partial);
        assert_eq!(result.diagnostics.len(), 1);

        // Only the extra '.' is skipped (§4.5): `name` still survives as the
        // right-hand side of the path, not as an `Error`/`Incomplete` node.
        match result.ast.kind {
            ExprKind::Binary { op: BinaryOp::Path, left, right } => {
                assert!(matches!(left.kind, ExprKind::TypeOrIdentifier(ref name) if name == "Patient"));
                assert!(matches!(right.kind, ExprKind::Identifier(ref name) if name == "name"));
            }
            other => panic!("expected Binary(Path, Patient, name), got {other:?}"),
        }

        // The diagnostic's range spans both dots: "Patient" is 7 bytes, so the
        // first '.' starts at offset 7 and the second '.' ends at offset 9.
        let diagnostic = &result.diagnostics[0];
        assert_eq!(diagnostic.code, DiagnosticCode::InvalidOperator);
        assert_eq!(diagnostic.range.start.offset, 7);
        assert_eq!(diagnostic.range.end.offset, 9);
    }

    #[test]
    fn env_var_and_special_variables() {
        let expr = parse_ok("%context");
        match expr.kind {
            ExprKind::Variable(Variable::External(name)) => assert_eq!(name, "context"),
            other => panic!("expected External variable, got {other:?}"),
        }

        let expr = parse_ok("$this");
        assert!(matches!(expr.kind, ExprKind::Variable(Variable::Special(VariableKind::This))));
    }

    #[test]
    fn indexing_and_collection_literal() {
        let expr = parse_ok("name[0]");
        assert!(matches!(expr.kind, ExprKind::Index { .. }));

        let expr = parse_ok("{1, 2, 3}");
        match expr.kind {
            ExprKind::Collection { items } => assert_eq!(items.len(), 3),
            other => panic!("expected Collection, got {other:?}"),
        }
    }

    #[test]
    fn decimal_vs_dot_number_disambiguation() {
        let expr = parse_ok("3.14");
        assert!(matches!(expr.kind, ExprKind::Literal(Literal::Decimal(_))));

        // `x.5` is a path into member `5`... which isn't a valid identifier,
        // so this is a parse error rather than `x` followed by a decimal.
        let err = parse("x.5", &ParserOptions::default()).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::ExpectedIdentifier);
    }
}
