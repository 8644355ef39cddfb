use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("End of stream")]
    EndOfStream,

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body (unified success format)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Degraded content is handled in the handlers; anything that still
        // escapes gets the unified body with a 200 status.
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        tracing::error!(error_message = %body.message, "Request failed");

        (StatusCode::OK, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
