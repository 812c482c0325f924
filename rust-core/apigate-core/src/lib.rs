//! # Apigate Core
//!
//! Request routing and dispatch for a small API gateway.
//! Resolves method and path to a registered route, validates the inputs
//! against the route's schema, invokes the backend handler under a
//! concurrency bound and deadline, and wraps the outcome in a uniform JSON
//! envelope.
//!
//! ## Architecture
//!
//! The [`RequestRouter`] is transport-neutral: it takes an
//! [`IncomingRequest`] and always returns a [`ResponseEnvelope`]. The hyper
//! [`Server`] is one transport on top of it; backends plug in through the
//! [`Invoker`] trait.
//!
//! ## Modules
//!
//! - `router` - Request router facade and builder
//! - `table` - Route table and path resolution
//! - `route` - Route definitions and path patterns
//! - `schema` - Declared route inputs
//! - `validation` - Input validation and coercion
//! - `types` - Field types and values
//! - `dispatcher` - Bounded, deadline-enforcing handler invocation
//! - `response` - Response envelope encoding
//! - `request` - Transport-neutral request
//! - `server` - HTTP server built on Hyper
//! - `json` - JSON parsing with simd-json
//! - `config` - File and environment configuration
//! - `logging` - tracing-subscriber setup
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod json;
pub mod logging;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod schema;
pub mod server;
pub mod table;
pub mod types;
pub mod validation;

pub use config::GatewayConfig;
pub use dispatcher::{DispatchConfig, Dispatcher, InvokeError, InvokeFuture, Invoker, LocalInvoker};
pub use error::{Error, Result};
pub use json::parse_json_bytes;
pub use logging::{init_logging, LogConfig};
pub use request::{IncomingRequest, Method};
pub use response::{encode, HandlerOutput, ResponseEnvelope};
pub use route::{HandlerRef, PathPattern, RouteDefinition};
pub use router::{RequestRouter, RouterBuilder};
pub use schema::{FieldSource, FieldSpec, InputSchema};
pub use server::{Server, ServerConfig};
pub use table::{MatchedRoute, RouteTable};
pub use types::{FieldType, FieldValue};
pub use validation::{validate, ValidatedInput, ValidationCode, ValidationError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
