//! API error handling.
//!
//! Every failure leaves the service as `{"error": ..., "code": ...}` with a
//! status the player can branch on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use vidgate_core::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Error code for programmatic handling
    pub code: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let code = err.error_code();
        let status = match &err {
            Error::DisallowedHost(_) | Error::InvalidSourceUrl(_) => StatusCode::BAD_REQUEST,
            Error::ResolutionParseFailure => StatusCode::NOT_FOUND,
            Error::ResolutionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::ResolutionNetwork(_) | Error::Network(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => {
                tracing::error!(error = %err, "Unexpected resolver error");
                return ApiError::internal("An unexpected error occurred");
            }
        };
        ApiError::new(status, code, err.to_string())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
