//! # Apigate Users
//!
//! Users service behind the gateway: a fixed list of users exposed through
//! two routes.
//!
//! | Route              | Handler     | Payload field |
//! |--------------------|-------------|---------------|
//! | `GET /users`       | `listUsers` | `users`       |
//! | `GET /users/{id}`  | `getUser`   | `user`        |

use apigate_core::{
    DispatchConfig, FieldType, InputSchema, InvokeError, LocalInvoker, RequestRouter,
    RouteDefinition, ValidatedInput,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Handler listing every user
pub const LIST_USERS: &str = "listUsers";
/// Handler fetching one user by id
pub const GET_USER: &str = "getUser";

/// A user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// User id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Age in years
    pub age: u32,
    /// Creation date (`YYYY-MM-DD`)
    pub created_at: String,
    /// Last update date (`YYYY-MM-DD`)
    pub updated_at: String,
}

impl User {
    fn new(id: i64, name: &str, age: u32, created_at: &str, updated_at: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            age,
            created_at: created_at.to_string(),
            updated_at: updated_at.to_string(),
        }
    }
}

/// The fixed user list served by this service
#[must_use]
pub fn dummy_users() -> Vec<User> {
    vec![
        User::new(1, "test1", 20, "2020-01-01", "2020-01-02"),
        User::new(2, "test2", 21, "2020-01-03", "2020-01-04"),
        User::new(3, "test4", 22, "2020-01-05", "2020-01-06"),
    ]
}

async fn list_users(users: Arc<Vec<User>>) -> Result<Value, InvokeError> {
    serde_json::to_value(users.as_slice()).map_err(|e| InvokeError::Failed(e.to_string()))
}

async fn get_user(users: Arc<Vec<User>>, input: ValidatedInput) -> Result<Value, InvokeError> {
    let id = input
        .get_int("id")
        .ok_or_else(|| InvokeError::Failed("missing id".to_string()))?;

    match users.iter().find(|user| user.id == id) {
        Some(user) => serde_json::to_value(user).map_err(|e| InvokeError::Failed(e.to_string())),
        None => {
            debug!(id, "User not found");
            Ok(Value::Null)
        }
    }
}

/// In-process invoker serving `users`
#[must_use]
pub fn invoker(users: Vec<User>) -> LocalInvoker {
    let users = Arc::new(users);
    let list = Arc::clone(&users);

    LocalInvoker::new()
        .with_handler(LIST_USERS, move |_| list_users(Arc::clone(&list)))
        .with_handler(GET_USER, move |input| get_user(Arc::clone(&users), input))
}

/// Routes of the users API
///
/// # Errors
///
/// Returns an error only if a pattern is malformed
pub fn routes() -> apigate_core::Result<Vec<RouteDefinition>> {
    Ok(vec![
        RouteDefinition::get("/users", LIST_USERS, "users")?,
        RouteDefinition::get("/users/{id}", GET_USER, "user")?
            .with_schema(InputSchema::new().path("id", FieldType::Integer)),
    ])
}

/// Build the users router
///
/// # Errors
///
/// Returns `Error::Config` for invalid dispatch limits
pub fn build_router(dispatch: DispatchConfig) -> apigate_core::Result<RequestRouter> {
    RequestRouter::builder()
        .routes(routes()?)
        .dispatch_config(dispatch)
        .invoker(Arc::new(invoker(dummy_users())))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use apigate_core::IncomingRequest;
    use serde_json::json;
    use std::time::Duration;

    fn router() -> RequestRouter {
        build_router(DispatchConfig::new(2, Duration::from_secs(1))).unwrap()
    }

    fn users_json() -> Value {
        json!([
            { "id": 1, "name": "test1", "age": 20, "created_at": "2020-01-01", "updated_at": "2020-01-02" },
            { "id": 2, "name": "test2", "age": 21, "created_at": "2020-01-03", "updated_at": "2020-01-04" },
            { "id": 3, "name": "test4", "age": 22, "created_at": "2020-01-05", "updated_at": "2020-01-06" },
        ])
    }

    #[tokio::test]
    async fn test_list_users() {
        let env = router().route(IncomingRequest::new("GET", "/users")).await;
        assert_eq!(env.status_code(), 200);
        assert_eq!(env.to_value(), json!({ "ok": true, "users": users_json() }));
    }

    #[tokio::test]
    async fn test_get_user() {
        let env = router().route(IncomingRequest::new("GET", "/users/2")).await;
        assert_eq!(env.status_code(), 200);
        let expected = users_json()[1].clone();
        assert_eq!(env.to_value(), json!({ "ok": true, "user": expected }));
    }

    #[tokio::test]
    async fn test_get_missing_user_is_null() {
        let env = router().route(IncomingRequest::new("GET", "/users/99")).await;
        assert_eq!(env.status_code(), 200);
        assert_eq!(env.to_value(), json!({ "ok": true, "user": null }));
    }

    #[tokio::test]
    async fn test_non_integer_id() {
        let env = router().route(IncomingRequest::new("GET", "/users/abc")).await;
        assert_eq!(env.status_code(), 400);
        assert_eq!(
            env.to_json(),
            r#"{"ok":false,"error":{"message":"id: expected integer"}}"#
        );
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let env = router().route(IncomingRequest::new("GET", "/unknown")).await;
        assert_eq!(env.status_code(), 404);
        assert_eq!(env.error_message(), Some("not found"));
    }

    #[test]
    fn test_routes() {
        let routes = routes().unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].payload_field, "user");
        assert!(routes[1].schema.get("id").is_some_and(|f| f.required));
    }

    #[test]
    fn test_invoker_registers_both_handlers() {
        let invoker = invoker(dummy_users());
        assert!(invoker.contains(&LIST_USERS.into()));
        assert!(invoker.contains(&GET_USER.into()));
    }

    #[test]
    fn test_build_router_rejects_zero_concurrency() {
        let result = build_router(DispatchConfig::new(0, Duration::from_secs(1)));
        tokio_test::assert_err!(result);
    }
}
