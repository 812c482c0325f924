//! # Response Envelope
//!
//! Renders handler results and request failures into the wire envelope:
//!
//! ```text
//! 200  {"ok": true, "<payload field>": <payload>}
//! 4xx  {"ok": false, "error": {"message": "..."}}
//! 5xx  {"ok": false, "error": {"message": "..."}}
//! ```
//!
//! | Outcome        | Status |
//! |----------------|--------|
//! | success        | 200    |
//! | validation     | 400    |
//! | not found      | 404    |
//! | overload       | 503    |
//! | timeout        | 504    |
//! | handler/other  | 500    |

use crate::error::Error;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::{error, warn};

/// Content type of every envelope
pub const CONTENT_TYPE: &str = "application/json";

/// A successful handler result and the field it is returned under
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    /// Payload field name declared by the route
    pub field: String,
    /// Handler payload
    pub payload: Value,
}

/// Envelope body
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeBody {
    /// `{"ok": true, "<field>": payload}`
    Success {
        /// Payload field name
        field: String,
        /// Payload
        payload: Value,
    },
    /// `{"ok": false, "error": {"message": ...}}`
    Failure {
        /// Caller-facing message
        message: String,
    },
}

/// The only value that crosses back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    status_code: u16,
    body: EnvelopeBody,
}

impl ResponseEnvelope {
    /// Successful envelope (200)
    pub fn success(field: impl Into<String>, payload: Value) -> Self {
        Self {
            status_code: 200,
            body: EnvelopeBody::Success {
                field: field.into(),
                payload,
            },
        }
    }

    /// Failure envelope
    ///
    /// A status in the 2xx range is coerced to 500 and an empty message to
    /// "internal error", so a failure never reads as `ok`.
    pub fn failure(status_code: u16, message: impl Into<String>) -> Self {
        let status_code = if (200..300).contains(&status_code) {
            500
        } else {
            status_code
        };
        let message = message.into();
        let message = if message.is_empty() {
            "internal error".to_string()
        } else {
            message
        };
        Self {
            status_code,
            body: EnvelopeBody::Failure { message },
        }
    }

    /// HTTP status code (never part of the body)
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Whether the request succeeded
    #[must_use]
    pub fn ok(&self) -> bool {
        matches!(self.body, EnvelopeBody::Success { .. })
    }

    /// Envelope body
    #[must_use]
    pub fn body(&self) -> &EnvelopeBody {
        &self.body
    }

    /// Failure message, if any
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.body {
            EnvelopeBody::Failure { message } => Some(message),
            EnvelopeBody::Success { .. } => None,
        }
    }

    /// Content type of the serialized body
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    /// Serialize the body
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"ok":false,"error":{"message":"internal error"}}"#.to_string())
    }

    /// Serialize the body as a JSON value
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match &self.body {
            EnvelopeBody::Success { field, payload } => {
                map.serialize_entry("ok", &true)?;
                map.serialize_entry(field, payload)?;
            }
            EnvelopeBody::Failure { message } => {
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", &ErrorBody { message })?;
            }
        }
        map.end()
    }
}

#[derive(serde::Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

/// Encode a request outcome
///
/// Internal causes are logged here and replaced by a stable message.
pub fn encode(outcome: std::result::Result<HandlerOutput, Error>) -> ResponseEnvelope {
    match outcome {
        Ok(output) => ResponseEnvelope::success(output.field, output.payload),
        Err(err) => {
            let status = err.status_code();
            match &err {
                Error::Handler { handler, cause } => {
                    error!(handler = %handler, cause = %cause, "Handler failed");
                }
                Error::Validation(_) | Error::RouteNotFound { .. } => {}
                other if status >= 500 => warn!(error = %other, "Request failed"),
                _ => {}
            }
            ResponseEnvelope::failure(status, err.public_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_success_envelope() {
        let env = encode(Ok(HandlerOutput {
            field: "users".to_string(),
            payload: json!([{ "id": 1 }]),
        }));
        assert_eq!(env.status_code(), 200);
        assert!(env.ok());
        assert_eq!(env.to_value(), json!({ "ok": true, "users": [{ "id": 1 }] }));
        assert_eq!(env.content_type(), "application/json");
    }

    #[test]
    fn test_validation_envelope() {
        let env = encode(Err(ValidationError::invalid_type("id", "integer").into()));
        assert_eq!(env.status_code(), 400);
        assert!(!env.ok());
        assert_eq!(
            env.to_value(),
            json!({ "ok": false, "error": { "message": "id: expected integer" } })
        );
    }

    #[test]
    fn test_status_table() {
        let cases = [
            (
                Error::RouteNotFound {
                    method: "GET".into(),
                    path: "/x".into(),
                },
                404,
                "not found",
            ),
            (
                Error::Timeout {
                    handler: "h".into(),
                    timeout: Duration::from_millis(5),
                },
                504,
                "request timed out",
            ),
            (Error::Overload { handler: "h".into() }, 503, "service overloaded"),
            (
                Error::Handler {
                    handler: "h".into(),
                    cause: "secret stack trace".into(),
                },
                500,
                "internal error",
            ),
        ];
        for (err, status, message) in cases {
            let env = encode(Err(err));
            assert_eq!(env.status_code(), status);
            assert_eq!(env.error_message(), Some(message));
            assert!(!env.to_json().contains("secret"));
        }
    }

    #[test]
    fn test_status_code_not_serialized() {
        let env = ResponseEnvelope::failure(404, "not found");
        assert_eq!(env.to_json(), r#"{"ok":false,"error":{"message":"not found"}}"#);
    }

    #[test]
    fn test_failure_invariants() {
        let env = ResponseEnvelope::failure(200, "");
        assert_eq!(env.status_code(), 500);
        assert_eq!(env.error_message(), Some("internal error"));
    }
}
