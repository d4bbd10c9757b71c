use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    /// Storage backend the server routes to
    pub backend: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.router.store().kind().to_string(),
    })
}
