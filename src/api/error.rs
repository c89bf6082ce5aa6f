use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::models::ErrorResponse;
use crate::history::HistoryError;
use crate::queue::QueueError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("a dispatch run is active")]
    DispatchActive,
    #[error("not enough credits: {reason}")]
    CreditsDenied { reason: String, shortfall: i64 },
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::DispatchActive => StatusCode::CONFLICT,
            ApiError::CreditsDenied { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::DispatchActive => "DISPATCH_ACTIVE",
            ApiError::CreditsDenied { .. } => "CREDITS_DENIED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(json!(body))).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<QueueError> for ApiError {
    fn from(value: QueueError) -> Self {
        match value {
            QueueError::DispatchActive => ApiError::DispatchActive,
            QueueError::ItemNotFound(id) => ApiError::NotFound(format!("item {id}")),
            QueueError::NotRetryable(id) => {
                ApiError::InvalidPayload(format!("item {id} is not in error state"))
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::AlreadyRunning => ApiError::DispatchActive,
            SessionError::NothingPending => {
                ApiError::InvalidPayload("queue has no pending items".to_string())
            }
            SessionError::CreditsDenied { reason, shortfall } => {
                ApiError::CreditsDenied { reason, shortfall }
            }
            SessionError::Queue(e) => e.into(),
            SessionError::Ledger(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<HistoryError> for ApiError {
    fn from(value: HistoryError) -> Self {
        match value {
            HistoryError::RecordNotFound(id) => ApiError::NotFound(format!("record {id}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
