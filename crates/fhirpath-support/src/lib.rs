//! # FHIRPath Support Types
//!
//! This crate provides the foundational types shared between the FHIRPath
//! parser/evaluator and any host embedding it: the universal [`Value`] that
//! every expression evaluates to, the [`Sequence`] it is always carried in,
//! and the [`EvaluationError`] raised when evaluation cannot proceed.
//!
//! Keeping these types in their own crate lets a host exchange FHIRPath
//! results (for example over an RPC boundary, or when caching evaluated
//! values) without depending on the lexer/parser/evaluator machinery in the
//! `fhirpath` crate.

pub mod error;
pub mod type_info;
pub mod value;

pub use error::{ErrorCode, EvaluationError, Position};
pub use type_info::TypeName;
pub use value::{Sequence, Value};
