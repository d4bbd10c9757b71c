//! Tool handlers
//!
//! CRUD endpoints for individual tools

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::Method,
    response::Json,
};
use serde_json::Value;

use super::json_body;
use crate::error::AppResult;
use crate::router::{Envelope, Request, Route};
use crate::state::AppState;

/// GET /tools
pub async fn list_tools(State(state): State<AppState>) -> AppResult<Json<Envelope>> {
    let envelope = state.router.dispatch(Request::get("/tools")).await?;
    Ok(Json(envelope))
}

/// POST /tools
pub async fn create_tool(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Envelope>> {
    let request = Request::new(Method::POST, "/tools").with_body(json_body(body)?)?;
    let envelope = state.router.dispatch(request).await?;
    if let Some(id) = envelope.data.as_ref().and_then(|d| d.get("id")) {
        tracing::info!("Created tool {}", id);
    }
    Ok(Json(envelope))
}

/// PUT /tools/:id
pub async fn update_tool(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Envelope>> {
    let envelope = state
        .router
        .dispatch_route(Route::UpdateTool(id), Some(json_body(body)?))
        .await?;
    Ok(Json(envelope))
}

/// DELETE /tools/:id
pub async fn delete_tool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Envelope>> {
    tracing::info!("Deleting tool {}", id);
    let envelope = state
        .router
        .dispatch_route(Route::DeleteTool(id), None)
        .await?;
    Ok(Json(envelope))
}
