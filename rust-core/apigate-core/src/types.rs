//! # Field Types
//!
//! Primitive types a schema field can declare, and the coercion from raw
//! request text (path segments, query values) or JSON body values.
//!
//! ## Design Principles
//!
//! - **S**: Only handles type coercion, presence checks live in `validation`
//! - **O**: New primitive types extend `FieldType` and the two coercion fns
//! - **D**: Validator depends on `coerce_str`/`coerce_json`, not on parsing details

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Supported field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    /// String type (default) - no conversion
    #[default]
    String,
    /// Integer type - parses to i64
    Integer,
    /// Float type - parses to f64
    Float,
    /// Boolean type - parses "true"/"false", "1"/"0" or "yes"/"no"
    Boolean,
}

impl FieldType {
    /// Get the type name for error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Converted field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// String value (no conversion performed)
    String(String),
    /// Integer value (i64)
    Integer(i64),
    /// Float value (f64)
    Float(f64),
    /// Boolean value
    Boolean(bool),
}

impl FieldValue {
    /// Borrow as str if String variant
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if Integer variant
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as bool if Boolean variant
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// Convert raw text to a typed value
///
/// Returns `None` when the text is not a valid representation of `ty`.
#[must_use]
pub fn coerce_str(raw: &str, ty: FieldType) -> Option<FieldValue> {
    match ty {
        FieldType::String => Some(FieldValue::String(raw.to_string())),
        FieldType::Integer => raw.parse::<i64>().ok().map(FieldValue::Integer),
        FieldType::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(FieldValue::Float),
        FieldType::Boolean => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(FieldValue::Boolean(true)),
            "false" | "0" | "no" => Some(FieldValue::Boolean(false)),
            _ => None,
        },
    }
}

/// Convert a JSON body value to a typed value
///
/// JSON strings fall back to the text rules of [`coerce_str`], so a body
/// `{"id": "7"}` satisfies an integer field the same way `?id=7` does.
#[must_use]
pub fn coerce_json(value: &Value, ty: FieldType) -> Option<FieldValue> {
    match (ty, value) {
        (_, Value::String(s)) => coerce_str(s, ty),
        (FieldType::Integer, Value::Number(n)) => n.as_i64().map(FieldValue::Integer),
        (FieldType::Float, Value::Number(n)) => n.as_f64().map(FieldValue::Float),
        (FieldType::Boolean, Value::Bool(b)) => Some(FieldValue::Boolean(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_type_names() {
        assert_eq!(FieldType::default(), FieldType::String);
        assert_eq!(FieldType::Integer.to_string(), "integer");
        assert_eq!(FieldType::Boolean.type_name(), "boolean");
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(coerce_str("123", FieldType::Integer), Some(FieldValue::Integer(123)));
        assert_eq!(coerce_str("-456", FieldType::Integer), Some(FieldValue::Integer(-456)));
        assert_eq!(coerce_str("abc", FieldType::Integer), None);
        assert_eq!(coerce_str("1.5", FieldType::Integer), None);
    }

    #[test]
    fn test_coerce_float() {
        assert_eq!(coerce_str("2.5", FieldType::Float), Some(FieldValue::Float(2.5)));
        assert_eq!(coerce_str("NaN", FieldType::Float), None);
    }

    #[test]
    fn test_coerce_bool() {
        assert_eq!(coerce_str("true", FieldType::Boolean), Some(FieldValue::Boolean(true)));
        assert_eq!(coerce_str("FALSE", FieldType::Boolean), Some(FieldValue::Boolean(false)));
        assert_eq!(coerce_str("1", FieldType::Boolean), Some(FieldValue::Boolean(true)));
        assert_eq!(coerce_str("maybe", FieldType::Boolean), None);
    }

    #[test]
    fn test_coerce_json_values() {
        assert_eq!(coerce_json(&json!(7), FieldType::Integer), Some(FieldValue::Integer(7)));
        assert_eq!(coerce_json(&json!(7.5), FieldType::Integer), None);
        assert_eq!(coerce_json(&json!("7"), FieldType::Integer), Some(FieldValue::Integer(7)));
        assert_eq!(coerce_json(&json!(3), FieldType::Float), Some(FieldValue::Float(3.0)));
        assert_eq!(coerce_json(&json!(true), FieldType::Boolean), Some(FieldValue::Boolean(true)));
        assert_eq!(coerce_json(&json!(1), FieldType::String), None);
        assert_eq!(coerce_json(&json!([1]), FieldType::Integer), None);
    }

    #[test]
    fn test_field_value_serializes_untagged() {
        let value = serde_json::to_value(FieldValue::Integer(42)).unwrap();
        assert_eq!(value, json!(42));
        let value = serde_json::to_value(FieldValue::String("7".into())).unwrap();
        assert_eq!(value, json!("7"));
    }
}
