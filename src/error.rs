//! Crate-wide error type and HTTP mapping (spec §7 error taxonomy).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Business and infrastructure errors for the whole crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request, self-swipe, password policy violation, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing/expired/invalid credential or token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to perform this action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No such resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate, or state-machine race loser.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Quota exceeded for the (user, action_kind, bucket).
    #[error("quota denied: {0}")]
    QuotaDenied(String),

    /// Sliding-window rate limit tripped. `retry_after` in seconds.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// A suspension point (notifier/LLM/vector-db/DB) exceeded its deadline.
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// Payment provider notification failed authenticity/consistency checks.
    #[error("payment verification failed: {0}")]
    PaymentVerifyFailed(String),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Database errors.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration errors.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound HTTP calls to external collaborators.
    #[error("external api error: {0}")]
    ExternalApi(#[from] reqwest::Error),

    /// Anything else, never leaked to the client.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O errors (e.g. binding the listener socket).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl Error {
    /// Stable error code for the wire envelope (spec §6/§7).
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::Unauthorized(_) => "AUTH_INVALID",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Conflict(_) => "CONFLICT",
            Error::QuotaDenied(_) => "QUOTA_DENIED",
            Error::RateLimited { .. } => "RATE_LIMIT",
            Error::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            Error::PaymentVerifyFailed(_) => "PAYMENT_VERIFY_FAILED",
            Error::ExternalApi(_) => "UPSTREAM_TIMEOUT",
            Error::Configuration(_)
            | Error::Database(_)
            | Error::Migration(_)
            | Error::Serialization(_)
            | Error::Internal(_)
            | Error::Io(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::QuotaDenied(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::UpstreamTimeout(_) | Error::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            Error::PaymentVerifyFailed(_) => StatusCode::BAD_REQUEST,
            Error::Configuration(_)
            | Error::Database(_)
            | Error::Migration(_)
            | Error::Serialization(_)
            | Error::Internal(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to send to the client. Internal causes are never echoed.
    fn public_message(&self) -> String {
        match self {
            Error::Configuration(_)
            | Error::Database(_)
            | Error::Migration(_)
            | Error::Serialization(_)
            | Error::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        }

        let retry_after = match &self {
            Error::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };

        let mut response = (
            self.status(),
            Json(ErrorBody {
                success: false,
                error: ErrorDetail {
                    code: self.code(),
                    message: self.public_message(),
                },
            }),
        )
            .into_response();

        if let Some(seconds) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::InvalidArgument("x".into()).code(), "INVALID_ARGUMENT");
        assert_eq!(Error::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(Error::QuotaDenied("x".into()).code(), "QUOTA_DENIED");
        assert_eq!(Error::RateLimited { retry_after: 5 }.code(), "RATE_LIMIT");
    }

    #[test]
    fn internal_causes_are_not_echoed() {
        let err = Error::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.public_message(), "an internal error occurred");
    }
}
