//! # Input Schema
//!
//! Declared shape of a route's inputs: which fields exist, where each one is
//! read from, its primitive type, and whether it is required. Declaration
//! order matters, it decides which failure is reported first.

use crate::types::FieldType;
use std::fmt;

/// Where a field is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSource {
    /// Captured path placeholder
    Path,
    /// Query string parameter
    Query,
    /// Top-level member of a JSON object body
    Body,
}

impl fmt::Display for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Query => write!(f, "query"),
            Self::Body => write!(f, "body"),
        }
    }
}

/// A single declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name, also the key in the validated input
    pub name: String,
    /// Source of the raw value
    pub source: FieldSource,
    /// Declared primitive type
    pub ty: FieldType,
    /// Whether absence is a validation failure
    pub required: bool,
}

impl FieldSpec {
    /// Create a field spec
    pub fn new(name: impl Into<String>, source: FieldSource, ty: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            source,
            ty,
            required,
        }
    }
}

/// Ordered collection of field specs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    /// Create an empty schema (accepts any request, yields `{}`)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Append a required path field
    #[must_use]
    pub fn path(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field(FieldSpec::new(name, FieldSource::Path, ty, true))
    }

    /// Append a query field
    #[must_use]
    pub fn query(self, name: impl Into<String>, ty: FieldType, required: bool) -> Self {
        self.field(FieldSpec::new(name, FieldSource::Query, ty, required))
    }

    /// Append a body field
    #[must_use]
    pub fn body(self, name: impl Into<String>, ty: FieldType, required: bool) -> Self {
        self.field(FieldSpec::new(name, FieldSource::Body, ty, required))
    }

    /// Fields in declaration order
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a field by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether any field reads from the body
    #[must_use]
    pub fn reads_body(&self) -> bool {
        self.fields.iter().any(|f| f.source == FieldSource::Body)
    }

    pub(crate) fn push(&mut self, spec: FieldSpec) {
        self.fields.push(spec);
    }

    /// Check that field names are unique
    pub(crate) fn duplicate_name(&self) -> Option<&str> {
        self.fields.iter().enumerate().find_map(|(i, f)| {
            self.fields[..i]
                .iter()
                .any(|prev| prev.name == f.name)
                .then_some(f.name.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_declaration_order() {
        let schema = InputSchema::new()
            .path("id", FieldType::Integer)
            .query("verbose", FieldType::Boolean, false)
            .body("name", FieldType::String, true);

        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "verbose", "name"]);
        assert!(schema.reads_body());
        assert_eq!(schema.get("verbose").map(|f| f.required), Some(false));
    }

    #[test]
    fn test_duplicate_name() {
        let schema = InputSchema::new()
            .query("id", FieldType::Integer, false)
            .body("id", FieldType::Integer, false);
        assert_eq!(schema.duplicate_name(), Some("id"));
        assert_eq!(InputSchema::new().duplicate_name(), None);
    }
}
