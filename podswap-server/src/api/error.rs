//! API Error Handling
//!
//! Protocol errors of the webhook endpoint. They only ever surface as a
//! status code and never stop the service.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// No event type header, or an empty one
    MissingEvent,
    /// The request body could not be read
    UnreadableBody(String),
    /// Signature header absent or not matching the body
    SignatureMismatch,
    /// The pipeline runner is gone, nothing can be queued
    QueueClosed,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingEvent | ApiError::UnreadableBody(_) => StatusCode::BAD_REQUEST,
            ApiError::SignatureMismatch => StatusCode::FORBIDDEN,
            ApiError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::MissingEvent => "event type header not found".to_string(),
            ApiError::UnreadableBody(err) => {
                tracing::error!("Failed to read body: {}", err);
                "failed to read request body".to_string()
            }
            ApiError::SignatureMismatch => "webhook signature does not match".to_string(),
            ApiError::QueueClosed => {
                tracing::error!("Request queue is closed, dropping trigger");
                "pipeline runner is shutting down".to_string()
            }
        };

        (self.status(), Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
