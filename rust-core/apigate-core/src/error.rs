//! # Error Handling
//!
//! Centralized error types for apigate core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Startup failures (`DuplicateRoute`, `InvalidRoutePattern`, `InvalidRoute`,
//! `Config`) stop router construction. Everything else is a per-request
//! failure that the router facade turns into a response envelope.

use crate::validation::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for apigate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the apigate runtime
#[derive(Error, Debug)]
pub enum Error {
    /// A route with the same method and normalized pattern is already registered
    #[error("Duplicate route: {method} {pattern}")]
    DuplicateRoute {
        /// Route method
        method: String,
        /// Normalized pattern (placeholders shown as `{}`)
        pattern: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Route definition is inconsistent (schema vs. pattern, payload field)
    #[error("Invalid route {pattern}: {reason}")]
    InvalidRoute {
        /// Pattern of the offending route
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What was wrong
        reason: String,
    },

    /// Router failed to match the requested path
    #[error("No route found for {method} {path}")]
    RouteNotFound {
        /// Request method as received
        method: String,
        /// The path that wasn't matched
        path: String,
    },

    /// Request input did not conform to the route schema
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Handler wait queue is full
    #[error("Handler {handler} overloaded")]
    Overload {
        /// Handler that rejected the request
        handler: String,
    },

    /// Invocation did not finish before the deadline
    #[error("Handler {handler} timed out after {timeout:?}")]
    Timeout {
        /// Handler that timed out
        handler: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// Backend invocation failed
    #[error("Handler {handler} failed: {cause}")]
    Handler {
        /// Handler that failed
        handler: String,
        /// Opaque backend cause, logged but never sent to the caller
        cause: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// HTTP status code this error maps to on the wire
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RouteNotFound { .. } => 404,
            Self::Validation(_) => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::Overload { .. } => 503,
            Self::Timeout { .. } => 504,
            _ => 500,
        }
    }

    /// Message safe to return to the caller
    ///
    /// Only validation errors describe the input; every other kind maps to a
    /// stable description so backend details never leak.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::RouteNotFound { .. } => "not found".to_string(),
            Self::PayloadTooLarge { .. } => "payload too large".to_string(),
            Self::Overload { .. } => "service overloaded".to_string(),
            Self::Timeout { .. } => "request timed out".to_string(),
            _ => "internal error".to_string(),
        }
    }
}
