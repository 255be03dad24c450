//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use meter_common::MeterError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for data service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Message carried by injected failures
pub const UNAVAILABLE_DETAIL: &str = "Internal Server Error: contact support for more information.";

#[derive(Error, Debug, PartialEq)]
pub enum ServiceError {
    /// Malformed page, size, total or count
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Injected transient failure
    #[error("{}", UNAVAILABLE_DETAIL)]
    Unavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MeterError> for ServiceError {
    fn from(err: MeterError) -> Self {
        match err {
            MeterError::InvalidRequest(msg) => ServiceError::InvalidRequest(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ServiceError::InvalidRequest(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ServiceError::Unavailable => {
                tracing::warn!("Injected failure, answering 500");
                (StatusCode::INTERNAL_SERVER_ERROR, UNAVAILABLE_DETAIL.to_string())
            },
            ServiceError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            },
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
