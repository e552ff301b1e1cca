//! Abstract syntax tree (§3, §6).
//!
//! Every node carries the source [`Position`] it starts at; when range
//! tracking is enabled (`ParserOptions::track_ranges`) nodes additionally
//! carry a [`Range`] covering their full span, used by tooling that needs to
//! highlight a whole subexpression rather than just its start.

use fhirpath_support::{TypeName, Value};
use rust_decimal::Decimal;

use crate::source::{Position, Range};

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub start: Position,
    pub range: Option<Range>,
}

impl Expr {
    pub fn new(kind: ExprKind, start: Position, range: Option<Range>) -> Self {
        Expr { kind, start, range }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    This,
    Index,
    Total,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Special(VariableKind),
    /// `%name`, `%'quoted name'`, or `` %`quoted name` ``, with the `%` and
    /// any quoting stripped.
    External(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Date(String),
    Time(String),
    DateTime(String),
    /// The `{}` / `null` empty-collection literal.
    Null,
}

impl Literal {
    /// The single-element sequence this literal evaluates to (empty for
    /// [`Literal::Null`]).
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Literal::Boolean(b) => Some(Value::Boolean(*b)),
            Literal::Integer(i) => Some(Value::Integer(*i)),
            Literal::Decimal(d) => Some(Value::Decimal(*d)),
            Literal::String(s) => Some(Value::String(s.clone())),
            Literal::Date(s) => Some(Value::Date(s.clone())),
            Literal::Time(s) => Some(Value::Time(s.clone())),
            Literal::DateTime(s) => Some(Value::DateTime(s.clone())),
            Literal::Null => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `.` — invoke the right-hand side against each element on the left.
    Path,
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Concat,
    Eq,
    Neq,
    Equivalent,
    NotEquivalent,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Xor,
    Implies,
    In,
    ContainsOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// A lower-case-initial bare name: a member/path segment.
    Identifier(String),
    /// An upper-case-initial bare name: ambiguous between a type name and a
    /// member until resolved against a model (§3).
    TypeOrIdentifier(String),
    Variable(Variable),
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// A flattened `|` chain: `a | b | c` parses to one `Union` with three
    /// operands rather than nested binary pairs (§4.4).
    Union { operands: Vec<Expr> },
    Function { name: String, args: Vec<Expr> },
    Index { target: Box<Expr>, index: Box<Expr> },
    /// A `{ ... }` collection literal.
    Collection { items: Vec<Expr> },
    /// `expr is Type`.
    MembershipTest { target: Box<Expr>, type_ref: Box<Expr> },
    /// `expr as Type`.
    TypeCast { target: Box<Expr>, type_ref: Box<Expr> },
    /// A type name appearing as an operand of `is`/`as`, or as the argument
    /// to `ofType`/`is`/`as` in function-call form.
    TypeReference(TypeName),
    /// A synthesized placeholder for a syntax error, produced only in
    /// error-recovery mode.
    Error { message: String },
    /// A synthesized placeholder for a construct recovery gave up trying to
    /// complete, produced only in error-recovery mode.
    Incomplete,
}

impl ExprKind {
    pub fn is_error_or_incomplete(&self) -> bool {
        matches!(self, ExprKind::Error { .. } | ExprKind::Incomplete)
    }
}
