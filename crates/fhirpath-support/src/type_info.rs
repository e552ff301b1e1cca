//! Minimal type-name model used by `is`/`as`/`ofType`/`type()`.
//!
//! Full FHIR schema resolution (deciding whether a `Node` conforms to a
//! named FHIR profile) is out of scope (spec.md §1 Non-goals). What remains
//! is the System namespace FHIRPath always has available, plus a best-effort
//! check for `Node`s that carry a conventional `resourceType` discriminator —
//! the same convention FHIR JSON uses and the only one this engine can see
//! without a model provider.

use std::fmt;

/// A type name as it appears in `is Type`, `as Type`, or `ofType(Type)`,
/// optionally namespaced (`System.String` vs. bare `String`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub namespace: Option<String>,
    pub name: String,
}

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        TypeName { namespace: None, name: name.into() }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeName { namespace: Some(namespace.into()), name: name.into() }
    }

    /// Parses a dotted type reference such as `System.Boolean` or `Patient`.
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once('.') {
            Some((ns, name)) => TypeName::namespaced(ns, name),
            None => TypeName::new(text),
        }
    }

    /// True when this name matches one of FHIRPath's System primitive types,
    /// regardless of whether a `System.` namespace was written explicitly.
    pub fn is_system(&self, system_name: &str) -> bool {
        self.name == system_name
            && self.namespace.as_deref().map(|ns| ns == "System").unwrap_or(true)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
