use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::session::SessionStatus;

/// Severity attached to every error message, per the UCP error contract.
/// Agents use this to decide whether a failure is silently retryable or
/// needs a buyer decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Recoverable,
    RequiresBuyerInput,
    RequiresBuyerReview,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub param: String,
    pub message: String,
}

impl FieldError {
    pub fn new(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Invalid session status: {current}")]
    InvalidStatus { current: SessionStatus },

    #[error("Checkout session has expired")]
    SessionExpired,

    #[error("No payment gateway available: {0}")]
    NoGatewayAvailable(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn validation(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(param, message)])
    }
}

/// One entry of the UCP error payload.
#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub severity: Severity,
}

impl ErrorMessage {
    fn error(code: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message_type: "error".to_string(),
            code: code.into(),
            message: message.into(),
            param: None,
            severity,
        }
    }
}

/// Wire shape for every error response: a status tag plus one or more
/// coded messages.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub messages: Vec<ErrorMessage>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, response) = match self {
            ApiError::Service(err) => service_error_response(err),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    status: "validation_error".to_string(),
                    messages: vec![ErrorMessage::error(
                        "invalid_request",
                        message,
                        Severity::Recoverable,
                    )],
                },
            ),
        };

        (status, Json(response)).into_response()
    }
}

fn service_error_response(err: ServiceError) -> (StatusCode, ErrorResponse) {
    match err {
        ServiceError::NotFound(msg) => (
            StatusCode::NOT_FOUND,
            ErrorResponse {
                status: "not_found".to_string(),
                messages: vec![ErrorMessage::error("not_found", msg, Severity::Recoverable)],
            },
        ),
        ServiceError::Validation(fields) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                status: "validation_error".to_string(),
                messages: fields
                    .into_iter()
                    .map(|f| ErrorMessage {
                        message_type: "error".to_string(),
                        code: format!("invalid_{}", f.param),
                        message: f.message,
                        param: Some(f.param),
                        severity: Severity::Recoverable,
                    })
                    .collect(),
            },
        ),
        ServiceError::InvalidStatus { current } => (
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                status: "invalid_session_status".to_string(),
                messages: vec![ErrorMessage::error(
                    "invalid_status",
                    format!("Operation not allowed. Current status: {}", current),
                    Severity::Recoverable,
                )],
            },
        ),
        ServiceError::SessionExpired => (
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                status: "session_expired".to_string(),
                messages: vec![ErrorMessage::error(
                    "session_expired",
                    "This checkout session has expired",
                    Severity::Recoverable,
                )],
            },
        ),
        ServiceError::NoGatewayAvailable(msg) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                status: "error".to_string(),
                messages: vec![ErrorMessage::error(
                    "no_gateway_available",
                    msg,
                    Severity::RequiresBuyerInput,
                )],
            },
        ),
        ServiceError::PaymentFailed(msg) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                status: "error".to_string(),
                messages: vec![ErrorMessage::error(
                    "payment_failed",
                    msg,
                    Severity::RequiresBuyerInput,
                )],
            },
        ),
        ServiceError::StoreError(msg)
        | ServiceError::SerializationError(msg)
        | ServiceError::InternalError(msg) => {
            // Full detail stays server-side; the wire gets a generic message.
            tracing::error!("internal error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    status: "error".to_string(),
                    messages: vec![ErrorMessage::error(
                        "internal_error",
                        "An error occurred while processing your request.",
                        Severity::Recoverable,
                    )],
                },
            )
        }
    }
}
