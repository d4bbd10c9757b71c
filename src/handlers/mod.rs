//! Request handlers module
//!
//! Thin axum adapters that turn HTTP requests into router requests.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::Value;

use crate::error::AppError;

pub mod group;
pub mod tool;

/// Unwrap a JSON body, reporting malformed input as a validation error
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::Validation(format!("请求体格式错误: {}", e.body_text())))
}
