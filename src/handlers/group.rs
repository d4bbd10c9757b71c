//! Group handlers
//!
//! Bulk rename/delete. Both rewrite matching tools one at a time.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::Method,
    response::Json,
};
use serde_json::Value;

use super::json_body;
use crate::error::AppResult;
use crate::router::{Envelope, Request};
use crate::state::AppState;

/// POST /groups/rename
pub async fn rename_group(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Envelope>> {
    let request = Request::new(Method::POST, "/groups/rename").with_body(json_body(body)?)?;
    let envelope = state.router.dispatch(request).await?;
    tracing::info!("Renamed group, {} tools moved", envelope.count.unwrap_or(0));
    Ok(Json(envelope))
}

/// POST /groups/delete - tools are moved to "未分组", never deleted
pub async fn delete_group(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Envelope>> {
    let request = Request::new(Method::POST, "/groups/delete").with_body(json_body(body)?)?;
    let envelope = state.router.dispatch(request).await?;
    tracing::info!("Deleted group, {} tools moved", envelope.count.unwrap_or(0));
    Ok(Json(envelope))
}
