use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::responses::JsonResponse;
use crate::services::entitlements::EntitlementError;
use crate::services::stripe::StripeServiceError;

/// Caller-facing failure classes. Every handler converts downstream errors into one of these.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    AuthenticationRequired,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    QuotaExceeded(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::AuthenticationRequired => {
                (StatusCode::UNAUTHORIZED, "authentication_required")
            }
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::QuotaExceeded(_) => (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_failure"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        JsonResponse::error_with_code(status, &self.to_string(), code).into_response()
    }
}

impl From<EntitlementError> for ApiError {
    fn from(err: EntitlementError) -> Self {
        match err {
            EntitlementError::Storage(err) => {
                error!(?err, "entitlement storage failure");
                ApiError::Internal("Failed to access billing records".into())
            }
            EntitlementError::Upstream(err) => err.into(),
        }
    }
}

impl From<StripeServiceError> for ApiError {
    fn from(err: StripeServiceError) -> Self {
        error!(?err, "billing provider request failed");
        ApiError::Upstream("Billing provider request failed".into())
    }
}
