use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("未处理的请求: {0}")]
    UnhandledRequest(String),

    #[error("Server responded with {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// Mutation failure already logged in detail; carries a user-facing message.
    #[error("{0}")]
    Operation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors the user can act on directly, as opposed to backend failures.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::NotFound(_))
    }
}

/// Error response body, same envelope shape as successful responses
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "工具不存在".to_string()),
            AppError::UnhandledRequest(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Json(err) => (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", err)),
            AppError::Upstream { status, message } => {
                tracing::error!("Upstream error {}: {}", status, message);
                (StatusCode::BAD_GATEWAY, "Upstream Error".to_string())
            }
            AppError::Transport(err) => {
                tracing::error!("Transport error: {}", err);
                (StatusCode::BAD_GATEWAY, "Upstream Error".to_string())
            }
            AppError::Io(err) => {
                tracing::error!("IO error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "IO Error".to_string())
            }
            AppError::Config(msg) => {
                tracing::error!("Config error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration Error".to_string())
            }
            AppError::Operation(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = ErrorResponse {
            success: false,
            error: message,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;

/// Helper trait for converting Option to AppError::NotFound
pub trait OptionExt<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = AppError::NotFound("tool-1".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let err = AppError::Validation("缺少必填字段".to_string());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = AppError::Upstream {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_upstream_message_keeps_server_text() {
        let err = AppError::Upstream {
            status: 400,
            message: "column \"group\" does not exist".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Server responded with 400: column \"group\" does not exist"
        );
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_not_found("Item not found");
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(result.unwrap_err().is_user_facing());
    }
}
