use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use revel_booking::{
    CancelError, CheckoutError, ConfirmError, PaymentVerifyError, RefundError, StoreError,
};

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated(String),
    Forbidden(String),
    NotFound(String),
    /// The booking's current state does not admit the operation.
    Conflict(String),
    /// At least one requested line has no inventory left. Distinct from
    /// `Conflict` so clients can offer a date change instead of a retry.
    InsufficientAvailability(String),
    /// The request was understood but fails a business rule.
    Validation(String),
    /// The payment provider could not be reached; safe to retry.
    Unavailable(String),
    /// A verified money movement could not be recorded. The message is
    /// returned verbatim because the client must know to retry.
    CommitNotRecorded(String),
    Internal(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::InsufficientAvailability(msg) => {
                (StatusCode::CONFLICT, "INSUFFICIENT_AVAILABILITY", msg)
            }
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_UNAVAILABLE", msg)
            }
            ApiError::CommitNotRecorded(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "COMMIT_NOT_RECORDED", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
            ApiError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ConfirmError> for ApiError {
    fn from(err: ConfirmError) -> Self {
        let message = err.to_string();
        match err {
            ConfirmError::Unauthenticated => ApiError::Unauthenticated(message),
            ConfirmError::AccessDenied => ApiError::Forbidden(message),
            ConfirmError::NotFound => ApiError::NotFound(message),
            // The confirm handler intercepts this as a replay; any other
            // surface treats it as a state conflict.
            ConfirmError::AlreadyConfirmed { .. } => ApiError::Conflict(message),
            ConfirmError::InvalidState { .. } => ApiError::Conflict(message),
            ConfirmError::EmptyBooking => ApiError::Validation(message),
            ConfirmError::Payment(PaymentVerifyError::GatewayUnavailable(_)) => {
                ApiError::Unavailable(message)
            }
            ConfirmError::Payment(_) => ApiError::Validation(message),
            ConfirmError::InsufficientAvailability { .. } => {
                ApiError::InsufficientAvailability(message)
            }
            ConfirmError::ReferenceCollisionExhausted => ApiError::Internal(message),
            ConfirmError::PostPaymentCommitFailure { .. } => ApiError::CommitNotRecorded(message),
            ConfirmError::Store(_) => ApiError::Internal(message),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        let message = err.to_string();
        match err {
            CheckoutError::Store(_) => ApiError::Internal(message),
            _ => ApiError::Validation(message),
        }
    }
}

impl From<CancelError> for ApiError {
    fn from(err: CancelError) -> Self {
        let message = err.to_string();
        match err {
            CancelError::NotFound => ApiError::NotFound(message),
            CancelError::InvalidState { .. } => ApiError::Conflict(message),
            CancelError::Store(_) => ApiError::Internal(message),
        }
    }
}

impl From<RefundError> for ApiError {
    fn from(err: RefundError) -> Self {
        let message = err.to_string();
        match err {
            RefundError::NotFound => ApiError::NotFound(message),
            RefundError::InvalidState { .. } => ApiError::Conflict(message),
            RefundError::InvalidAmount { .. } => ApiError::Validation(message),
            RefundError::MissingPaymentReference => ApiError::Conflict(message),
            RefundError::PaymentNotFound => ApiError::Conflict(message),
            RefundError::RefundRejected => ApiError::Conflict(message),
            RefundError::GatewayUnavailable(_) => ApiError::Unavailable(message),
            RefundError::PostRefundCommitFailure { .. } => ApiError::CommitNotRecorded(message),
            RefundError::Store(_) => ApiError::Internal(message),
        }
    }
}
