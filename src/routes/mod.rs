use axum::{
    http::{header, Method, Uri},
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::AppError;
use crate::handlers;
use crate::state::AppState;

pub mod health;

/// Create the function-style API router, nested under `base_path` when set
pub fn create_router(state: AppState, base_path: &str) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(600));

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Tool routes
        .route(
            "/tools",
            get(handlers::tool::list_tools).post(handlers::tool::create_tool),
        )
        .route(
            "/tools/:id",
            put(handlers::tool::update_tool).delete(handlers::tool::delete_tool),
        )
        // Group routes
        .route("/groups/rename", post(handlers::group::rename_group))
        .route("/groups/delete", post(handlers::group::delete_group));

    let prefix = base_path.trim_matches('/');
    let app = if prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(&format!("/{}", prefix), api_routes)
    };

    app.fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for unknown routes
pub async fn fallback(method: Method, uri: Uri) -> AppError {
    AppError::UnhandledRequest(format!("{} {}", uri.path(), method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Tool, GROUP_UNGROUPED};
    use crate::kv::MemoryKv;
    use crate::router::Envelope;
    use crate::storage::KvToolStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(base_path: &str) -> Router {
        let store = Arc::new(KvToolStore::new(Arc::new(MemoryKv::new())));
        create_router(AppState::new(store), base_path)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn tool_body() -> Value {
        json!({
            "name": "A",
            "group": "G1",
            "posterUrl": "https://x/p.jpg",
            "modelUrl": "https://x/m.glb"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = app("");
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backend"], "kv");
    }

    #[tokio::test]
    async fn test_tool_and_group_routes() {
        let app = app("/make-server");

        let (status, body) = send(&app, Method::POST, "/make-server/tools", Some(tool_body())).await;
        assert_eq!(status, StatusCode::OK);
        let envelope: Envelope = serde_json::from_value(body).unwrap();
        let tool: Tool = envelope.data_as().unwrap();
        assert_eq!(tool.group, "G1");

        let (_, body) = send(
            &app,
            Method::POST,
            "/make-server/groups/delete",
            Some(json!({"groupName": "G1"})),
        )
        .await;
        assert_eq!(body, json!({"success": true, "count": 1}));

        let (_, body) = send(&app, Method::GET, "/make-server/tools", None).await;
        assert_eq!(body["data"][0]["group"], GROUP_UNGROUPED);

        let uri = format!("/make-server/tools/{}", tool.id);
        let (status, body) = send(&app, Method::PUT, &uri, Some(json!({"name": "B"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "B");

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = app("");

        let (status, body) = send(&app, Method::POST, "/tools", Some(json!({"name": "A"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "缺少必填字段");

        let (status, _) = send(&app, Method::PUT, "/tools/missing", Some(json!({"name": "X"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::PATCH, "/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_encoded_id_is_not_truncated() {
        let app = app("");
        let (_, body) = send(&app, Method::POST, "/tools", Some(tool_body())).await;
        let tool: Tool = serde_json::from_value(body["data"].clone()).unwrap();

        let uri = format!("/tools/{}%3Fx", tool.id);
        let (status, _) = send(&app, Method::PUT, &uri, Some(json!({"name": "B"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, Method::GET, "/tools", None).await;
        let tools: Vec<Tool> = serde_json::from_value(body["data"].clone()).unwrap();
        assert_eq!(tools, vec![tool]);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = app("");
        let request = Request::builder()
            .method(Method::POST)
            .uri("/groups/rename")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{oops"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
