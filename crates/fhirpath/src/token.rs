//! The closed set of token kinds the lexer produces (§6).

use crate::source::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Number,
    String,
    True,
    False,
    Null,
    Date,
    Time,
    DateTime,

    // Identifiers
    Identifier,
    DelimitedIdentifier,

    // Variables
    This,
    Index,
    Total,
    EnvVar,

    // Keywords
    And,
    Or,
    Xor,
    Not,
    Implies,
    Is,
    As,
    In,
    Contains,
    Div,
    Mod,

    // Calendar-unit keywords
    Year,
    Years,
    Month,
    Months,
    Week,
    Weeks,
    Day,
    Days,
    Hour,
    Hours,
    Minute,
    Minutes,
    Second,
    Seconds,
    Millisecond,
    Milliseconds,

    // Operators / punctuators
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Plus,
    Minus,
    Star,
    Slash,
    Concat,
    Pipe,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    Similar,
    NotSimilar,
    Comma,
    Percent,
    At,

    // Control
    Eof,
}

impl TokenKind {
    /// The keywords recognized by exact text match (§4.2). Delimited
    /// identifiers (`` `name` ``) bypass this table entirely.
    pub fn keyword(text: &str) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match text {
            "true" => True,
            "false" => False,
            "null" => Null,
            "and" => And,
            "or" => Or,
            "xor" => Xor,
            "not" => Not,
            "implies" => Implies,
            "in" => In,
            "contains" => Contains,
            "as" => As,
            "is" => Is,
            "div" => Div,
            "mod" => Mod,
            "year" => Year,
            "years" => Years,
            "month" => Month,
            "months" => Months,
            "week" => Week,
            "weeks" => Weeks,
            "day" => Day,
            "days" => Days,
            "hour" => Hour,
            "hours" => Hours,
            "minute" => Minute,
            "minutes" => Minutes,
            "second" => Second,
            "seconds" => Seconds,
            "millisecond" => Millisecond,
            "milliseconds" => Milliseconds,
            "$this" => This,
            "$index" => Index,
            "$total" => Total,
            _ => return None,
        })
    }

    /// True for keywords that, after a `.`, are reclassified as plain
    /// identifiers (§4.5) because FHIR field names may collide with them.
    /// `$this`/`$index`/`$total` are never reclassified: they are variable
    /// tokens, not keywords, and `$` can never begin a field name.
    pub fn reclassifies_after_dot(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            And | Or
                | Xor
                | Not
                | Implies
                | Is
                | As
                | In
                | Contains
                | Div
                | Mod
                | True
                | False
                | Null
                | Year
                | Years
                | Month
                | Months
                | Week
                | Weeks
                | Day
                | Days
                | Hour
                | Hours
                | Minute
                | Minutes
                | Second
                | Seconds
                | Millisecond
                | Milliseconds
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range,
}

impl Token {
    pub fn new(kind: TokenKind, range: Range) -> Self {
        Token { kind, range }
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.range.start.offset..self.range.end.offset]
    }
}
