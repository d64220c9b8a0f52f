//! Axum handler executing a connection schema
//!
//! Every request gets a fresh [`AppContext`], dropped once the response is
//! built.

use crate::context::AppContext;
use crate::registry::ConnectionSchema;
use async_graphql::{Request, Response};
use axum::{extract::Extension, http::HeaderMap, Json};
use uuid::Uuid;

/// Request id from the `x-request-id` header, or a new one
pub fn extract_request_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

/// Standard GraphQL handler
///
/// # Example
///
/// ```rust,no_run
/// use axum::{routing::post, Extension, Router};
/// use graphql_connections::{graphql_handler, SchemaBuilder};
///
/// # fn example() -> graphql_connections::Result<()> {
/// let schema = SchemaBuilder::new().finish()?;
/// let app: Router = Router::new()
///     .route("/graphql", post(graphql_handler))
///     .layer(Extension(schema));
/// # Ok(())
/// # }
/// ```
pub async fn graphql_handler(
    Extension(schema): Extension<ConnectionSchema>,
    headers: HeaderMap,
    req: Json<Request>,
) -> Json<Response> {
    let context = AppContext::with_request_id(extract_request_id(&headers));
    tracing::debug!(request_id = %context.request_id(), "executing graphql request");

    let response = schema.execute(req.0, context).await;

    Json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_from_header() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-request-id",
            HeaderValue::from_str(&id.to_string()).unwrap(),
        );
        assert_eq!(extract_request_id(&headers), id);
    }

    #[test]
    fn test_request_id_generated() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("not-a-uuid"));
        let first = extract_request_id(&headers);
        let second = extract_request_id(&HeaderMap::new());
        assert_ne!(first, second);
    }
}
