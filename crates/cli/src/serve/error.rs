//! HTTP error mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use careescrow_booking::BookingError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("invalid request body: {0}")]
    BadRequest(String),

    /// The body names a different user than the session.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
}

impl ApiError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Booking(e) => match e {
                BookingError::Validation(_) => StatusCode::BAD_REQUEST,
                BookingError::Unauthorized(_) => StatusCode::FORBIDDEN,
                BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
                BookingError::InvalidTransition { .. }
                | BookingError::FundingUnresolved { .. } => StatusCode::CONFLICT,
                BookingError::IdentityProvisioningFailed { .. }
                | BookingError::EscrowFundingFailed { .. }
                | BookingError::EscrowReleaseFailed { .. }
                | BookingError::EscrowRefundFailed { .. }
                | BookingError::ConfirmationNotRecorded { .. }
                | BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Booking(e) => e.code(),
            ApiError::BadRequest(_) => "VALIDATION_ERROR",
            ApiError::Forbidden(_) => "UNAUTHORIZED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.code(),
            tx_hash: match &self {
                ApiError::Booking(e) => e.tx_hash().map(str::to_string),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}
