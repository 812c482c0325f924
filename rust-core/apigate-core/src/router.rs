//! # Request Router
//!
//! Entry point for every request: resolve the route, validate the inputs,
//! dispatch to the handler and encode the outcome.
//!
//! ```text
//! IncomingRequest -> RouteTable -> validate -> Dispatcher -> encode -> ResponseEnvelope
//! ```
//!
//! Each stage short-circuits: a request that fails to resolve or validate
//! never reaches the dispatcher, and `route` always produces an envelope.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: The router only sequences stages, each stage lives in its own module
//! - **O**: New backends plug in through [`Invoker`] without touching routing
//! - **D**: Depends on the `Invoker` abstraction, not on a concrete backend

use crate::dispatcher::{DispatchConfig, Dispatcher, Invoker};
use crate::error::{Error, Result};
use crate::request::{IncomingRequest, Method};
use crate::response::{encode, HandlerOutput, ResponseEnvelope};
use crate::route::RouteDefinition;
use crate::table::RouteTable;
use crate::validation::validate;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Collects routes and collaborators, then builds a [`RequestRouter`]
#[derive(Default)]
pub struct RouterBuilder {
    routes: Vec<RouteDefinition>,
    dispatch: Option<DispatchConfig>,
    invoker: Option<Arc<dyn Invoker>>,
}

impl RouterBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route
    #[must_use]
    pub fn route(mut self, route: RouteDefinition) -> Self {
        self.routes.push(route);
        self
    }

    /// Add several routes in order
    #[must_use]
    pub fn routes(mut self, routes: impl IntoIterator<Item = RouteDefinition>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Set the dispatch limits
    #[must_use]
    pub fn dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.dispatch = Some(config);
        self
    }

    /// Set the backend invoker
    #[must_use]
    pub fn invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Register all routes and build the router
    ///
    /// # Errors
    ///
    /// - `Error::DuplicateRoute` / `Error::InvalidRoute` for a bad route set
    /// - `Error::Config` if dispatch limits or the invoker are missing or invalid
    pub fn build(self) -> Result<RequestRouter> {
        let dispatch = self
            .dispatch
            .ok_or_else(|| Error::config("dispatch config is required"))?;
        let invoker = self
            .invoker
            .ok_or_else(|| Error::config("invoker is required"))?;

        let mut table = RouteTable::new();
        for route in self.routes {
            table.register(route)?;
        }

        let dispatcher = Dispatcher::new(dispatch, invoker, table.handlers())?;
        info!(routes = table.len(), "Router built");

        Ok(RequestRouter {
            inner: Arc::new(Inner { table, dispatcher }),
        })
    }
}

impl std::fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("routes", &self.routes.len())
            .field("dispatch", &self.dispatch)
            .field("invoker", &self.invoker.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct Inner {
    table: RouteTable,
    dispatcher: Dispatcher,
}

/// Shared, cheaply clonable request router
#[derive(Debug, Clone)]
pub struct RequestRouter {
    inner: Arc<Inner>,
}

impl RequestRouter {
    /// Start building a router
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Handle one request end to end
    pub async fn route(&self, request: IncomingRequest) -> ResponseEnvelope {
        let span = info_span!("request", method = %request.method, path = %request.path);

        async {
            let started = Instant::now();
            let envelope = encode(self.process(&request).await);
            info!(
                method = %request.method,
                path = %request.path,
                status = envelope.status_code(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            );
            envelope
        }
        .instrument(span)
        .await
    }

    async fn process(&self, request: &IncomingRequest) -> Result<HandlerOutput> {
        let method: Method = request.method.parse().map_err(|()| Error::RouteNotFound {
            method: request.method.clone(),
            path: request.path.clone(),
        })?;

        let matched = self.inner.table.resolve(method, &request.path)?;
        let route = Arc::clone(&matched.route);

        let input = validate(&route.schema, &matched, &request.query, request.body_bytes())?;
        let payload = self.inner.dispatcher.dispatch(&route.handler, input).await?;

        Ok(HandlerOutput {
            field: route.payload_field.clone(),
            payload,
        })
    }

    /// Registered routes
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.inner.table
    }

    /// Handler dispatcher
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{InvokeError, LocalInvoker};
    use crate::schema::InputSchema;
    use crate::types::FieldType;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn dispatch_config() -> DispatchConfig {
        DispatchConfig::new(4, Duration::from_secs(1))
    }

    fn users_router(calls: Arc<AtomicUsize>) -> RequestRouter {
        let get_calls = Arc::clone(&calls);
        let invoker = LocalInvoker::new()
            .with_handler("listUsers", |_| async {
                Ok::<_, InvokeError>(json!([{ "id": 1 }, { "id": 2 }]))
            })
            .with_handler("getUser", move |input| {
                get_calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(json!({ "id": input.get_int("id") })) }
            });

        RequestRouter::builder()
            .route(RouteDefinition::get("/users", "listUsers", "users").unwrap())
            .route(
                RouteDefinition::get("/users/{id}", "getUser", "user")
                    .unwrap()
                    .with_schema(InputSchema::new().path("id", FieldType::Integer)),
            )
            .dispatch_config(dispatch_config())
            .invoker(Arc::new(invoker))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_round_trip() {
        let router = users_router(Arc::new(AtomicUsize::new(0)));
        let env = router.route(IncomingRequest::new("GET", "/users")).await;
        assert_eq!(env.status_code(), 200);
        assert_eq!(
            env.to_value(),
            json!({ "ok": true, "users": [{ "id": 1 }, { "id": 2 }] })
        );
    }

    #[test]
    fn test_route_outside_async_context() {
        let router = users_router(Arc::new(AtomicUsize::new(0)));
        let env = tokio_test::block_on(router.route(IncomingRequest::new("GET", "/users/")));
        assert!(env.ok());
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let router = users_router(Arc::new(AtomicUsize::new(0)));
        let env = router.route(IncomingRequest::new("GET", "/users/2")).await;
        assert_eq!(env.status_code(), 200);
        assert_eq!(env.to_value(), json!({ "ok": true, "user": { "id": 2 } }));
    }

    #[tokio::test]
    async fn test_validation_short_circuits_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = users_router(Arc::clone(&calls));

        let env = router.route(IncomingRequest::new("GET", "/users/abc")).await;
        assert_eq!(env.status_code(), 400);
        assert_eq!(
            env.to_value(),
            json!({ "ok": false, "error": { "message": "id: expected integer" } })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        router.route(IncomingRequest::new("GET", "/users/1")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found() {
        let router = users_router(Arc::new(AtomicUsize::new(0)));

        let env = router.route(IncomingRequest::new("GET", "/unknown")).await;
        assert_eq!(env.status_code(), 404);
        assert_eq!(env.error_message(), Some("not found"));

        let env = router.route(IncomingRequest::new("POST", "/users")).await;
        assert_eq!(env.status_code(), 404);

        let env = router.route(IncomingRequest::new("BREW", "/users")).await;
        assert_eq!(env.status_code(), 404);
    }

    #[tokio::test]
    async fn test_unknown_route_ignores_malformed_body() {
        let router = users_router(Arc::new(AtomicUsize::new(0)));
        let req = IncomingRequest::new("PUT", "/nowhere").with_body("{not json");
        let env = router.route(req).await;
        assert_eq!(env.status_code(), 404);
    }

    #[tokio::test]
    async fn test_handler_failure_is_opaque() {
        let invoker = LocalInvoker::new().with_handler("boom", |_| async {
            Err::<Value, _>(InvokeError::Failed("db password rejected".into()))
        });
        let router = RequestRouter::builder()
            .route(RouteDefinition::post("/boom", "boom", "data").unwrap())
            .dispatch_config(dispatch_config())
            .invoker(Arc::new(invoker))
            .build()
            .unwrap();

        let env = router.route(IncomingRequest::new("POST", "/boom")).await;
        assert_eq!(env.status_code(), 500);
        assert_eq!(env.error_message(), Some("internal error"));
        assert!(!env.to_json().contains("password"));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_504() {
        let invoker = LocalInvoker::new().with_handler("slow", |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, InvokeError>(Value::Null)
        });
        let router = RequestRouter::builder()
            .route(RouteDefinition::get("/slow", "slow", "data").unwrap())
            .dispatch_config(DispatchConfig::new(1, Duration::from_millis(20)))
            .invoker(Arc::new(invoker))
            .build()
            .unwrap();

        let env = router.route(IncomingRequest::new("GET", "/slow")).await;
        assert_eq!(env.status_code(), 504);
        assert_eq!(env.error_message(), Some("request timed out"));
    }

    #[tokio::test]
    async fn test_body_fields_reach_handler() {
        let invoker = LocalInvoker::new().with_handler("createUser", |input| async move {
            Ok::<_, InvokeError>(json!({
                "name": input.get_str("name"),
                "age": input.get_int("age"),
            }))
        });
        let router = RequestRouter::builder()
            .route(
                RouteDefinition::post("/users", "createUser", "user")
                    .unwrap()
                    .with_schema(
                        InputSchema::new()
                            .body("name", FieldType::String, true)
                            .body("age", FieldType::Integer, false),
                    ),
            )
            .dispatch_config(dispatch_config())
            .invoker(Arc::new(invoker))
            .build()
            .unwrap();

        let req = IncomingRequest::new("POST", "/users").with_body(r#"{"name":"ada","age":"36"}"#);
        let env = router.route(req).await;
        assert_eq!(
            env.to_value(),
            json!({ "ok": true, "user": { "name": "ada", "age": 36 } })
        );

        let env = router.route(IncomingRequest::new("POST", "/users")).await;
        assert_eq!(env.error_message(), Some("name: required"));
    }

    #[test]
    fn test_duplicate_route_fails_build() {
        let result = RequestRouter::builder()
            .route(RouteDefinition::get("/users/{id}", "a", "user").unwrap())
            .route(RouteDefinition::get("/users/{uid}", "b", "user").unwrap())
            .dispatch_config(dispatch_config())
            .invoker(Arc::new(LocalInvoker::new()))
            .build();
        assert!(matches!(result, Err(Error::DuplicateRoute { .. })));
    }

    #[test]
    fn test_missing_collaborators_fail_build() {
        let result = RequestRouter::builder()
            .invoker(Arc::new(LocalInvoker::new()))
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));

        let result = RequestRouter::builder()
            .dispatch_config(DispatchConfig::new(0, Duration::from_secs(1)))
            .invoker(Arc::new(LocalInvoker::new()))
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
