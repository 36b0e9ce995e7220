//! HTTP rendering of bridge errors.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AuthError;

/// Wire form of a failed call.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code from [`AuthError::code`].
    pub code: &'static str,

    /// Human-readable detail. Never echoes credential material.
    pub message: String,

    /// Seconds to wait, present only on `rate_limited`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidCredential { .. }
        | AuthError::ProviderNotConfigured { .. }
        | AuthError::TokenExpired
        | AuthError::TokenMalformed
        | AuthError::SignatureInvalid => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AuthError::IdentityConflict { .. } | AuthError::InvalidState { .. } => StatusCode::CONFLICT,
        AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::TransientProviderError { .. } => StatusCode::BAD_GATEWAY,
        AuthError::Storage { .. } | AuthError::Configuration { .. } | AuthError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request refused");
        }

        let retry_after = self.retry_after();
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            retry_after: retry_after.map(|d| d.as_secs()),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
