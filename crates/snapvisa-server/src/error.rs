//! HTTP Error Responses

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use snapvisa_core::CoreError;
use snapvisa_feedback::FeedbackError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error returned from any JSON endpoint
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn payments_disabled() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid admin password")
    }
}

pub const fn status_of(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Validation(_) | CoreError::State(_) => StatusCode::BAD_REQUEST,
        CoreError::Permission(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Provider(_) => StatusCode::BAD_GATEWAY,
        CoreError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::Provider(_) | CoreError::Storage(_) | CoreError::Internal(_) => {
                tracing::error!(code = err.code(), error = %err, "Request failed");
            }
            CoreError::Permission(_) => {
                tracing::warn!(error = %err, "Request rejected");
            }
            _ => {}
        }

        Self {
            status: status_of(&err),
            code: err.code(),
            message: err.user_message(),
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(err: FeedbackError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::new(status, "PAYLOAD_TOO_LARGE", "Uploaded file is too large.");
        }
        Self::new(status, "INVALID_UPLOAD", err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code.into(),
            }),
        )
            .into_response()
    }
}
