use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// Canonical JSON payload for error responses.
#[derive(Debug, Serialize, Clone)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Helper for controllers that need to return `(StatusCode, Json<ApiMessage>)`.
pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiMessage>) {
    (status, Json(ApiMessage::new(message)))
}

/// Logs an internal failure and hides its details behind a stable message.
pub fn internal_error(err: anyhow::Error) -> (StatusCode, Json<ApiMessage>) {
    tracing::error!(?err, "internal server error");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
