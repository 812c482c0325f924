//! # Validation Module
//!
//! Checks a matched request's path, query and body inputs against the route's
//! declared [`InputSchema`] and produces a typed [`ValidatedInput`].
//!
//! Checks run in a fixed order:
//!
//! 1. every required field is present (first missing field by declaration order)
//! 2. every present field coerces to its declared type
//!
//! Business rules are the backend's concern and are not checked here.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Only handles presence and type checks
//! - **O**: Extensible error codes via enum
//! - **D**: Coercion delegated to `types`

use crate::json::parse_json_bytes;
use crate::schema::{FieldSource, FieldSpec, InputSchema};
use crate::table::MatchedRoute;
use crate::types::{coerce_json, coerce_str, FieldValue};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    /// Required field is missing
    Required,
    /// Value is invalid type
    InvalidType,
    /// Body is not a JSON object
    InvalidBody,
}

/// The first validation failure found for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Field name (`body` for a malformed body)
    pub field: String,
    /// Short reason, e.g. "required" or "expected integer"
    pub reason: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl ValidationError {
    /// Create a "required field" error
    pub fn required(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: "required".to_string(),
            code: ValidationCode::Required,
        }
    }

    /// Create an "invalid type" error
    pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
        Self {
            field: field.into(),
            reason: format!("expected {expected}"),
            code: ValidationCode::InvalidType,
        }
    }

    /// Create a malformed-body error
    #[must_use]
    pub fn invalid_body() -> Self {
        Self {
            field: "body".to_string(),
            reason: "expected JSON object".to_string(),
            code: ValidationCode::InvalidBody,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Typed, schema-conformant request input
///
/// Holds only the fields that were present; optional fields the caller left
/// out are absent rather than defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedInput {
    values: BTreeMap<String, FieldValue>,
}

impl ValidatedInput {
    /// Create an empty input
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.values.insert(name.into(), value);
    }

    /// Get a value by field name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Get an integer field
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_int)
    }

    /// Get a string field
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    /// Get a boolean field
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(FieldValue::as_bool)
    }

    /// Whether a field is present
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of present fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no fields are present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Raw value for a field before coercion
enum Raw<'a> {
    Text(&'a str),
    Json(&'a Value),
}

/// Validate request inputs against a schema
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate(
    schema: &InputSchema,
    matched: &MatchedRoute,
    query: &HashMap<String, String>,
    body: Option<&[u8]>,
) -> Result<ValidatedInput, ValidationError> {
    let body = if schema.reads_body() {
        parse_body(body)?
    } else {
        None
    };

    let body = body.as_ref();
    let lookup = |spec: &FieldSpec| raw_value(spec, &matched.params, query, body);

    if let Some(missing) = schema
        .fields()
        .iter()
        .find(|spec| spec.required && lookup(*spec).is_none())
    {
        return Err(ValidationError::required(&missing.name));
    }

    let mut input = ValidatedInput::new();
    for spec in schema.fields() {
        let Some(raw) = lookup(spec) else {
            continue;
        };
        let value = match raw {
            Raw::Text(text) => coerce_str(text, spec.ty),
            Raw::Json(json) => coerce_json(json, spec.ty),
        }
        .ok_or_else(|| ValidationError::invalid_type(&spec.name, spec.ty.type_name()))?;
        input.insert(spec.name.clone(), value);
    }

    Ok(input)
}

fn raw_value<'a>(
    spec: &FieldSpec,
    params: &'a HashMap<String, String>,
    query: &'a HashMap<String, String>,
    body: Option<&'a Map<String, Value>>,
) -> Option<Raw<'a>> {
    match spec.source {
        FieldSource::Path => params.get(&spec.name).map(|v| Raw::Text(v.as_str())),
        FieldSource::Query => query.get(&spec.name).map(|v| Raw::Text(v.as_str())),
        FieldSource::Body => body
            .and_then(|obj| obj.get(&spec.name))
            .filter(|v| !v.is_null())
            .map(Raw::Json),
    }
}

/// Parse an optional body into a JSON object
fn parse_body(body: Option<&[u8]>) -> Result<Option<Map<String, Value>>, ValidationError> {
    let Some(bytes) = body.filter(|b| !b.is_empty()) else {
        return Ok(None);
    };
    let mut buf = bytes.to_vec();
    match parse_json_bytes::<Value>(&mut buf) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        _ => Err(ValidationError::invalid_body()),
    }
}
