//! # Route Definitions
//!
//! Route metadata: method, parsed path pattern, input schema, handler
//! reference and the payload field the handler's result is returned under.
//!
//! ## Design Principles
//!
//! - **S**: RouteDefinition only holds route metadata and pattern matching
//! - **O**: Extensible via additional fields without breaking changes
//! - **D**: Decoupled from RouteTable ordering and lookup

use crate::error::{Error, Result};
use crate::request::Method;
use crate::schema::{FieldSource, FieldSpec, InputSchema};
use crate::types::FieldType;
use std::fmt;
use std::sync::Arc;

/// Opaque handler identifier, resolved by the dispatcher's invoker
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerRef(Arc<str>);

impl HandlerRef {
    /// Create a handler reference from a name
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Handler name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for HandlerRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// One segment of a path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must match the request segment exactly (case-sensitive)
    Literal(String),
    /// Matches any single non-empty segment and captures it
    Param(String),
}

/// Split a path into segments
///
/// The leading slash is optional, a single trailing slash is ignored and `/`
/// is zero segments. Empty segments are kept so `/a//b` never matches a
/// two-segment pattern and `//` never matches `/`.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Vec::new();
    }
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.split('/').collect()
}

/// Parsed path pattern such as `/users/{id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern string
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for empty segments, malformed or
    /// empty placeholders, and placeholder names used twice.
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRoutePattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        for part in split_path(pattern) {
            if part.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if inner.is_empty() || inner.contains(['{', '}']) {
                    return Err(invalid("malformed placeholder"));
                }
                let duplicate = segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(n) if n == inner));
                if duplicate {
                    return Err(invalid("duplicate placeholder name"));
                }
                segments.push(Segment::Param(inner.to_string()));
            } else if part.contains(['{', '}']) {
                return Err(invalid("placeholder must span the whole segment"));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Pattern as registered
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Number of literal segments, used to rank competing matches
    #[must_use]
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Normalized form used for duplicate detection (`/users/{}`)
    #[must_use]
    pub fn normalized(&self) -> String {
        let parts: Vec<&str> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Literal(lit) => lit.as_str(),
                Segment::Param(_) => "{}",
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    /// Match request segments, returning captured `(name, raw value)` pairs
    #[must_use]
    pub fn match_segments<'p>(&self, path: &[&'p str]) -> Option<Vec<(&str, &'p str)>> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut captures = Vec::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(lit) if lit == actual => {}
                Segment::Param(name) if !actual.is_empty() => {
                    captures.push((name.as_str(), *actual));
                }
                _ => return None,
            }
        }
        Some(captures)
    }
}

/// Immutable route definition registered at startup
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    /// HTTP method
    pub method: Method,
    /// Parsed path pattern
    pub pattern: PathPattern,
    /// Declared inputs
    pub schema: InputSchema,
    /// Handler to dispatch to
    pub handler: HandlerRef,
    /// Success envelope field the payload is returned under
    pub payload_field: String,
}

impl RouteDefinition {
    /// Create a route definition with an empty schema
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed
    pub fn new(
        method: Method,
        pattern: &str,
        handler: impl Into<HandlerRef>,
        payload_field: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            method,
            pattern: PathPattern::parse(pattern)?,
            schema: InputSchema::new(),
            handler: handler.into(),
            payload_field: payload_field.into(),
        })
    }

    /// Convenience constructor for a GET route
    pub fn get(pattern: &str, handler: impl Into<HandlerRef>, payload_field: &str) -> Result<Self> {
        Self::new(Method::Get, pattern, handler, payload_field)
    }

    /// Convenience constructor for a POST route
    pub fn post(pattern: &str, handler: impl Into<HandlerRef>, payload_field: &str) -> Result<Self> {
        Self::new(Method::Post, pattern, handler, payload_field)
    }

    /// Convenience constructor for a PUT route
    pub fn put(pattern: &str, handler: impl Into<HandlerRef>, payload_field: &str) -> Result<Self> {
        Self::new(Method::Put, pattern, handler, payload_field)
    }

    /// Convenience constructor for a PATCH route
    pub fn patch(pattern: &str, handler: impl Into<HandlerRef>, payload_field: &str) -> Result<Self> {
        Self::new(Method::Patch, pattern, handler, payload_field)
    }

    /// Convenience constructor for a DELETE route
    pub fn delete(pattern: &str, handler: impl Into<HandlerRef>, payload_field: &str) -> Result<Self> {
        Self::new(Method::Delete, pattern, handler, payload_field)
    }

    /// Replace the input schema
    #[must_use]
    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Check consistency and fill in implied path fields
    ///
    /// Placeholders the schema does not declare become required string path
    /// fields, so handlers always see every captured segment.
    pub(crate) fn finalize(mut self) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidRoute {
            pattern: self.pattern.as_str().to_string(),
            reason,
        };

        if self.payload_field.is_empty() || matches!(self.payload_field.as_str(), "ok" | "error") {
            return Err(invalid(format!(
                "payload field `{}` is reserved or empty",
                self.payload_field
            )));
        }
        if let Some(name) = self.schema.duplicate_name() {
            return Err(invalid(format!("field `{name}` declared twice")));
        }
        if let Some(orphan) = self
            .schema
            .fields()
            .iter()
            .filter(|f| f.source == FieldSource::Path)
            .find(|f| !self.pattern.param_names().any(|p| p == f.name))
        {
            return Err(invalid(format!(
                "path field `{}` has no placeholder",
                orphan.name
            )));
        }

        let implied: Vec<String> = self
            .pattern
            .param_names()
            .filter(|p| self.schema.get(p).is_none())
            .map(str::to_string)
            .collect();
        for name in implied {
            self.schema
                .push(FieldSpec::new(name, FieldSource::Path, FieldType::String, true));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert!(split_path("/").is_empty());
        assert!(split_path("").is_empty());
        assert_eq!(split_path("/users"), ["users"]);
        assert_eq!(split_path("/users/"), ["users"]);
        assert_eq!(split_path("users/1"), ["users", "1"]);
        assert_eq!(split_path("/a//b"), ["a", "", "b"]);
        assert_eq!(split_path("//"), [""]);
    }

    #[test]
    fn test_pattern_parse() {
        let pattern = PathPattern::parse("/users/{user_id}/posts/{post_id}").unwrap();
        assert_eq!(pattern.literal_count(), 2);
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), ["user_id", "post_id"]);
        assert_eq!(pattern.normalized(), "/users/{}/posts/{}");
    }

    #[test]
    fn test_pattern_root() {
        let pattern = PathPattern::parse("/").unwrap();
        assert!(pattern.segments().is_empty());
        assert_eq!(pattern.normalized(), "/");
    }

    #[test]
    fn test_pattern_rejects_malformed() {
        for bad in ["/users/{}", "/users/{id", "/a//b", "//", "/users/{id}/{id}", "/x{id}"] {
            assert!(
                matches!(PathPattern::parse(bad), Err(Error::InvalidRoutePattern { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_match_segments() {
        let pattern = PathPattern::parse("/users/{id}").unwrap();
        assert_eq!(pattern.match_segments(&["users", "7"]), Some(vec![("id", "7")]));
        assert_eq!(pattern.match_segments(&["users", ""]), None);
        assert_eq!(pattern.match_segments(&["Users", "7"]), None);
        assert_eq!(pattern.match_segments(&["users", "7", "extra"]), None);
    }

    #[test]
    fn test_finalize_adds_implied_path_fields() {
        let route = RouteDefinition::get("/orgs/{org}/users/{id}", "getUser", "user")
            .unwrap()
            .with_schema(InputSchema::new().path("id", FieldType::Integer))
            .finalize()
            .unwrap();

        let names: Vec<_> = route.schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "org"]);
        assert_eq!(route.schema.get("org").map(|f| f.ty), Some(FieldType::String));
    }

    #[test]
    fn test_finalize_rejects_orphan_path_field() {
        let result = RouteDefinition::get("/users", "listUsers", "users")
            .unwrap()
            .with_schema(InputSchema::new().path("id", FieldType::Integer))
            .finalize();
        assert!(matches!(result, Err(Error::InvalidRoute { .. })));
    }

    #[test]
    fn test_finalize_rejects_reserved_payload_field() {
        let result = RouteDefinition::get("/users", "listUsers", "ok").unwrap().finalize();
        assert!(matches!(result, Err(Error::InvalidRoute { .. })));
    }

    #[test]
    fn test_handler_ref() {
        let a = HandlerRef::from("listUsers");
        let b = HandlerRef::new(String::from("listUsers"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "listUsers");
    }
}
