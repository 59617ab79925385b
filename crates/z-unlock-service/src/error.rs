//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::coordinator::ConsumptionError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - already entitled or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Consumption failed; carries the stable error code.
    #[error(transparent)]
    Consumption(#[from] ConsumptionError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::Consumption(err) => consumption_parts(err),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

fn consumption_parts(
    err: &ConsumptionError,
) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
    let (status, message, details) = match err {
        ConsumptionError::NoEntitlement => (
            StatusCode::PAYMENT_REQUIRED,
            "A purchase is required for a clean copy".to_string(),
            None,
        ),
        ConsumptionError::NotFound { purchase_id } => (
            StatusCode::CONFLICT,
            "Entitlement changed, please retry".to_string(),
            Some(serde_json::json!({ "purchase_id": purchase_id })),
        ),
        ConsumptionError::Exhausted { purchase_id } => (
            StatusCode::CONFLICT,
            "Credit no longer available".to_string(),
            Some(serde_json::json!({ "purchase_id": purchase_id })),
        ),
        ConsumptionError::Transient(msg) => {
            tracing::warn!(error = %msg, "Transient consumption failure");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Temporarily unavailable, retry with the same generation id".to_string(),
                Some(serde_json::json!({ "retry": true })),
            )
        }
        ConsumptionError::GenerationConflict { generation_id } => (
            StatusCode::CONFLICT,
            err.to_string(),
            Some(serde_json::json!({ "generation_id": generation_id })),
        ),
    };

    (status, err.code(), message, details)
}

impl From<z_unlock_store::StoreError> for ApiError {
    fn from(err: z_unlock_store::StoreError) -> Self {
        use z_unlock_store::StoreError;

        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::InvalidTransition { .. } | StoreError::Exhausted { .. } => {
                Self::Conflict(err.to_string())
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}
