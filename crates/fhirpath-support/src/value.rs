//! The universal value type FHIRPath expressions evaluate to.
//!
//! FHIRPath has no notion of "a single value" distinct from "a one-element
//! collection" — everything is a [`Sequence`]. [`Value`] is the element type
//! of that sequence: a scalar, or a [`Value::Node`] referencing a subtree of
//! the caller's input (an object or array in the source JSON).

use std::rc::Rc;

use rust_decimal::Decimal;

/// A single element of a FHIRPath result.
///
/// There is deliberately no `Value::Sequence` or `Value::Collection` variant:
/// sequences are always represented as `Vec<Value>` ([`Sequence`]), never
/// nested. Flattening nested collections produced by navigation is the
/// evaluator's job (§3 Invariants), not something the value model needs to
/// represent.
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    /// Partial or full date, stored in its canonical `YYYY[-MM[-DD]]` textual
    /// form. Precision is recovered by counting the present components
    /// rather than carried as a separate tag, matching how literals are
    /// written.
    Date(String),
    /// `HH[:MM[:SS[.fff]]]`, with no date component.
    Time(String),
    /// `YYYY-MM-DD[THH[:MM[:SS[.fff]]]][Z|±HH:MM]`.
    DateTime(String),
    /// A reference into the caller's input tree: a JSON object or array
    /// encountered during navigation. Leaf JSON scalars are converted to the
    /// matching `Value` variant as soon as they are read off a node, so a
    /// `Node` is always non-leaf (an object or an array element that is
    /// itself an object).
    Node(Rc<serde_json::Value>),
}

/// The only shape a FHIRPath result takes: an ordered, possibly-empty,
/// flat list of [`Value`]s.
pub type Sequence = Vec<Value>;

impl Value {
    /// Wraps a JSON value read from the input tree as a `Value`, converting
    /// scalars directly and leaving objects/arrays as [`Value::Node`] for
    /// the evaluator to navigate further.
    pub fn from_json(json: Rc<serde_json::Value>) -> Option<Value> {
        match json.as_ref() {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Boolean(*b)),
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Integer(i))
                } else {
                    let d: Decimal = n.as_f64().and_then(Decimal::from_f64_retain)?;
                    Some(Value::Decimal(d))
                }
            }
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Some(Value::Node(json)),
        }
    }

    /// Normalizes any Rust-side input (typically a `serde_json::Value`) into
    /// a [`Sequence`] per §6: non-sequence values become a one-element
    /// sequence, `null`/missing becomes empty, and a top-level JSON array
    /// becomes one element per item.
    pub fn input_to_sequence(json: serde_json::Value) -> Sequence {
        match json {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| Value::from_json(Rc::new(item)))
                .collect(),
            other => Value::from_json(Rc::new(other)).into_iter().collect(),
        }
    }

    /// The FHIRPath/System type name of this value, used by `is`/`as`/`type()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::DateTime(_) => "DateTime",
            Value::Node(_) => "Object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Integer(a), Value::Decimal(b)) | (Value::Decimal(b), Value::Integer(a)) => {
                Decimal::from(*a) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }
}
