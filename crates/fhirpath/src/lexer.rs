//! Single-pass tokenizer (§4.2).
//!
//! Dispatch on the first character after skipping trivia routes to a
//! specific scanner; every scanner returns a [`Token`] whose range is the
//! only thing it carries — the lexeme is recovered by slicing `source` with
//! [`Token::text`] when a caller needs it.

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::source::{Position, Range};
use crate::token::{Token, TokenKind};

/// A lex failure: offending range, stable code, and message.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub code: DiagnosticCode,
    pub range: Range,
    pub message: String,
}

struct Checkpoint {
    idx: usize,
    line: usize,
    col: usize,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    idx: usize,
    line: usize,
    col: usize,
    recovery: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, recovery: bool) -> Self {
        Lexer {
            source,
            chars: source.char_indices().collect(),
            idx: 0,
            line: 0,
            col: 0,
            recovery,
            diagnostics: Vec::new(),
        }
    }

    /// Scans the whole source into a token stream terminated by an `Eof`
    /// token. In recovery mode, lex errors are recorded as diagnostics and
    /// the scanner resynchronizes by skipping the offending character; in
    /// strict mode the first lex error aborts scanning.
    pub fn tokenize(mut self) -> Result<(Vec<Token>, Vec<Diagnostic>), LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.position();
            if self.peek().is_none() {
                tokens.push(Token::new(TokenKind::Eof, Range::new(start, start)));
                break;
            }
            match self.next_token(start) {
                Ok(token) => tokens.push(token),
                Err(err) => {
                    if self.recovery {
                        self.diagnostics.push(Diagnostic::error(err.code, err.range, err.message));
                        if self.idx == self.checkpoint().idx {
                            self.bump();
                        }
                    } else {
                        return Err(err);
                    }
                }
            }
        }
        Ok((tokens, self.diagnostics))
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint { idx: self.idx, line: self.line, col: self.col }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.idx = checkpoint.idx;
        self.line = checkpoint.line;
        self.col = checkpoint.col;
    }

    fn offset(&self) -> usize {
        self.chars.get(self.idx).map(|&(o, _)| o).unwrap_or(self.source.len())
    }

    fn position(&self) -> Position {
        Position { line: self.line, column: self.col, offset: self.offset() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).map(|&(_, c)| c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        match c {
            '\n' => {
                self.line += 1;
                self.col = 0;
            }
            '\r' => {}
            _ => self.col += 1,
        }
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => break,
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self, start: Position) -> Result<Token, LexError> {
        let c = self.peek().expect("next_token called at EOF");
        match c {
            '\'' | '"' => self.scan_string(start, c),
            '`' => self.scan_delimited_identifier(start),
            '0'..='9' => self.scan_number(start),
            'a'..='z' | 'A'..='Z' | '_' => self.scan_identifier(start),
            '@' => self.scan_at(start),
            '$' => self.scan_dollar(start),
            '%' => self.scan_percent(start),
            _ => self.scan_operator(start),
        }
    }

    fn range_from(&self, start: Position) -> Range {
        Range::new(start, self.position())
    }

    fn scan_string(&mut self, start: Position, quote: char) -> Result<Token, LexError> {
        self.bump(); // opening quote
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        code: DiagnosticCode::UnterminatedString,
                        range: self.range_from(start),
                        message: "unterminated string literal".to_string(),
                    });
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    let escape_start = self.position();
                    self.bump();
                    self.scan_escape(escape_start, quote)?;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        Ok(Token::new(TokenKind::String, self.range_from(start)))
    }

    /// Validates (without decoding) one escape sequence after the backslash
    /// has already been consumed. `quote` is the enclosing quote character,
    /// which is itself a valid escape target (`\'` inside `'...'`).
    fn scan_escape(&mut self, escape_start: Position, quote: char) -> Result<(), LexError> {
        match self.peek() {
            Some(c) if c == quote || matches!(c, 'n' | 'r' | 't' | 'f' | '/' | '\\') => {
                self.bump();
                Ok(())
            }
            Some('u') => {
                self.bump();
                for _ in 0..4 {
                    match self.peek() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            self.bump();
                        }
                        _ => {
                            return Err(LexError {
                                code: DiagnosticCode::InvalidEscape,
                                range: self.range_from(escape_start),
                                message: "invalid \\u escape: expected exactly 4 hex digits"
                                    .to_string(),
                            });
                        }
                    }
                }
                Ok(())
            }
            _ => Err(LexError {
                code: DiagnosticCode::InvalidEscape,
                range: self.range_from(escape_start),
                message: "invalid escape sequence".to_string(),
            }),
        }
    }

    fn scan_delimited_identifier(&mut self, start: Position) -> Result<Token, LexError> {
        self.bump(); // opening backtick
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        code: DiagnosticCode::UnterminatedString,
                        range: self.range_from(start),
                        message: "unterminated delimited identifier".to_string(),
                    });
                }
                Some('`') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    // Delimited identifiers only need `\\` and `` \` `` escapes;
                    // anything else is still tolerated as a literal next char,
                    // matching the permissive "any character" grammar.
                    if self.peek().is_some() {
                        self.bump();
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        Ok(Token::new(TokenKind::DelimitedIdentifier, self.range_from(start)))
    }

    fn scan_number(&mut self, start: Position) -> Result<Token, LexError> {
        while matches!(self.peek(), Some('0'..='9')) {
            self.bump();
        }
        // The '.' is only consumed when followed by a digit, so `x.5`
        // tokenizes as `x`, `.`, `5`.
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some('0'..='9')) {
            self.bump();
            while matches!(self.peek(), Some('0'..='9')) {
                self.bump();
            }
        }
        Ok(Token::new(TokenKind::Number, self.range_from(start)))
    }

    fn scan_identifier(&mut self, start: Position) -> Result<Token, LexError> {
        while matches!(self.peek(), Some('a'..='z' | 'A'..='Z' | '0'..='9' | '_')) {
            self.bump();
        }
        let range = self.range_from(start);
        let text = self.source[range.start.offset..range.end.offset].to_string();
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
        Ok(Token::new(kind, range))
    }

    /// `$this` / `$index` / `$total` are the only valid `$`-prefixed tokens;
    /// anything else is an error (there is no bare `$` operator in FHIRPath).
    fn scan_dollar(&mut self, start: Position) -> Result<Token, LexError> {
        self.bump();
        while matches!(self.peek(), Some('a'..='z' | 'A'..='Z')) {
            self.bump();
        }
        let range = self.range_from(start);
        let text = &self.source[range.start.offset..range.end.offset];
        match TokenKind::keyword(text) {
            Some(kind @ (TokenKind::This | TokenKind::Index | TokenKind::Total)) => {
                Ok(Token::new(kind, range))
            }
            _ => Err(LexError {
                code: DiagnosticCode::UnexpectedToken,
                range,
                message: format!("unknown special variable '{text}'"),
            }),
        }
    }

    /// `%name`, `%'quoted string'`, or `` %`backquoted` ``. When `%` is not
    /// followed by a valid environment-variable start, it is emitted as the
    /// `%` operator instead (§4.2).
    fn scan_percent(&mut self, start: Position) -> Result<Token, LexError> {
        let checkpoint = self.checkpoint();
        self.bump(); // '%'
        match self.peek() {
            Some('a'..='z' | 'A'..='Z' | '_') => {
                while matches!(self.peek(), Some('a'..='z' | 'A'..='Z' | '0'..='9' | '_')) {
                    self.bump();
                }
                Ok(Token::new(TokenKind::EnvVar, self.range_from(start)))
            }
            Some('\'') => {
                self.restore(checkpoint);
                self.bump(); // '%'
                let inner_start = self.position();
                match self.scan_string(inner_start, '\'') {
                    Ok(_) => Ok(Token::new(TokenKind::EnvVar, self.range_from(start))),
                    Err(e) => Err(e),
                }
            }
            Some('`') => {
                self.restore(checkpoint);
                self.bump(); // '%'
                let inner_start = self.position();
                match self.scan_delimited_identifier(inner_start) {
                    Ok(_) => Ok(Token::new(TokenKind::EnvVar, self.range_from(start))),
                    Err(e) => Err(e),
                }
            }
            _ => {
                self.restore(checkpoint);
                self.bump();
                Ok(Token::new(TokenKind::Percent, self.range_from(start)))
            }
        }
    }

    /// Date/time literal starting with `@`. On parse failure the `@` is
    /// reinterpreted as the `AT` operator with the cursor restored to just
    /// past it (§4.2).
    fn scan_at(&mut self, start: Position) -> Result<Token, LexError> {
        let checkpoint = self.checkpoint();
        self.bump(); // '@'
        if let Some(kind) = self.try_scan_date_time() {
            return Ok(Token::new(kind, self.range_from(start)));
        }
        self.restore(checkpoint);
        self.bump(); // '@' only
        Ok(Token::new(TokenKind::At, self.range_from(start)))
    }

    fn digits(&mut self, count: usize) -> bool {
        let checkpoint = self.checkpoint();
        for _ in 0..count {
            if !matches!(self.peek(), Some('0'..='9')) {
                self.restore(checkpoint);
                return false;
            }
            self.bump();
        }
        true
    }

    fn try_scan_date_time(&mut self) -> Option<TokenKind> {
        if self.peek() == Some('T') {
            self.bump();
            self.try_scan_time_body();
            return Some(TokenKind::Time);
        }

        // YYYY
        if !self.digits(4) {
            return None;
        }
        let mut kind = TokenKind::Date;
        if self.peek() == Some('-') && matches!(self.peek_at(1), Some('0'..='9')) {
            self.bump();
            if !self.digits(2) {
                return Some(kind);
            }
            if self.peek() == Some('-') && matches!(self.peek_at(1), Some('0'..='9')) {
                self.bump();
                if !self.digits(2) {
                    return Some(kind);
                }
            }
        }
        if self.peek() == Some('T') {
            self.bump();
            kind = TokenKind::DateTime;
            self.try_scan_time_body();
            self.try_scan_timezone();
        }
        Some(kind)
    }

    fn try_scan_time_body(&mut self) {
        if !self.digits(2) {
            return;
        }
        if self.peek() == Some(':') {
            let checkpoint = self.checkpoint();
            self.bump();
            if !self.digits(2) {
                self.restore(checkpoint);
                return;
            }
            if self.peek() == Some(':') {
                let checkpoint = self.checkpoint();
                self.bump();
                if !self.digits(2) {
                    self.restore(checkpoint);
                    return;
                }
                if self.peek() == Some('.') && matches!(self.peek_at(1), Some('0'..='9')) {
                    self.bump();
                    while matches!(self.peek(), Some('0'..='9')) {
                        self.bump();
                    }
                }
            }
        }
    }

    fn try_scan_timezone(&mut self) {
        match self.peek() {
            Some('Z') => {
                self.bump();
            }
            Some('+') | Some('-') => {
                let checkpoint = self.checkpoint();
                self.bump();
                if self.digits(2) && self.eat(':') && self.digits(2) {
                    // consumed
                } else {
                    self.restore(checkpoint);
                }
            }
            _ => {}
        }
    }

    fn scan_operator(&mut self, start: Position) -> Result<Token, LexError> {
        let c = self.bump().expect("scan_operator called at EOF");
        let kind = match c {
            '.' => TokenKind::Dot,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '&' => TokenKind::Concat,
            '|' => TokenKind::Pipe,
            ',' => TokenKind::Comma,
            '~' => TokenKind::Similar,
            '<' => {
                if self.eat('=') {
                    TokenKind::Lte
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Gte
                } else {
                    TokenKind::Gt
                }
            }
            '=' => TokenKind::Eq,
            '!' => {
                if self.eat('=') {
                    TokenKind::Neq
                } else if self.eat('~') {
                    TokenKind::NotSimilar
                } else {
                    return Err(LexError {
                        code: DiagnosticCode::UnexpectedToken,
                        range: self.range_from(start),
                        message: "expected '=' or '~' after '!'".to_string(),
                    });
                }
            }
            other => {
                return Err(LexError {
                    code: DiagnosticCode::UnexpectedToken,
                    range: self.range_from(start),
                    message: format!("unexpected character '{other}'"),
                });
            }
        };
        Ok(Token::new(kind, self.range_from(start)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = Lexer::new(source, false).tokenize().expect("lex ok");
        assert!(diags.is_empty());
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn simple_path() {
        assert_eq!(
            kinds("Patient.name.given"),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dot_number_is_not_a_decimal() {
        // `x.5` tokenizes as `x`, `.`, `5` — not `x`, `.5`.
        assert_eq!(
            kinds("x.5"),
            vec![TokenKind::Identifier, TokenKind::Dot, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn decimal_number() {
        assert_eq!(kinds("3.14"), vec![TokenKind::Number, TokenKind::Eof]);
    }

    #[test]
    fn keywords_and_operators() {
        assert_eq!(
            kinds("true and false"),
            vec![TokenKind::True, TokenKind::And, TokenKind::False, TokenKind::Eof]
        );
        assert_eq!(
            kinds("a != b"),
            vec![TokenKind::Identifier, TokenKind::Neq, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn at_falls_back_to_operator_on_bad_date() {
        assert_eq!(kinds("@foo"), vec![TokenKind::At, TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn date_time_literal() {
        assert_eq!(kinds("@2024-01-15T14:30:00Z"), vec![TokenKind::DateTime, TokenKind::Eof]);
        assert_eq!(kinds("@2024"), vec![TokenKind::Date, TokenKind::Eof]);
        assert_eq!(kinds("@T14:30"), vec![TokenKind::Time, TokenKind::Eof]);
    }

    #[test]
    fn percent_env_var_and_bare_operator() {
        assert_eq!(kinds("%context"), vec![TokenKind::EnvVar, TokenKind::Eof]);
        assert_eq!(kinds("%'quoted var'"), vec![TokenKind::EnvVar, TokenKind::Eof]);
        assert_eq!(kinds("5 % 2"), vec![TokenKind::Number, TokenKind::Percent, TokenKind::Number, TokenKind::Eof]);
    }

    #[test]
    fn delimited_identifier_bypasses_keywords() {
        assert_eq!(kinds("`and`"), vec![TokenKind::DelimitedIdentifier, TokenKind::Eof]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // trailing comment\n.b /* block */ .c"),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_strict_error() {
        let err = Lexer::new("'abc", false).tokenize().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::UnterminatedString);
    }

    #[test]
    fn recovery_mode_continues_past_bad_character() {
        let (tokens, diags) = Lexer::new("a # b", true).tokenize().expect("lex ok in recovery");
        assert_eq!(diags.len(), 1);
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
    }
}
