//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//!
//! Telemetry-write failures never become a [`GatewayError`] on a caller's
//! path: the ingestion layer logs and swallows them (see
//! [`crate::telemetry::ingest`]).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "no rate found for currency JPY",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges below).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                |
/// |-----------|-------------------|----------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request            |
/// | 2000–2999 | Missing data      | 404 Not Found              |
/// | 3000–3999 | Server            | 500 Internal Server Error  |
/// | 5000–5999 | Upstream provider | 502 Bad Gateway            |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The upstream rate provider returned a non-2xx status or the
    /// transport failed. The attempt is still logged by the caller; the
    /// error reaches the original client as a failed conversion.
    #[error("upstream provider failure: {detail}")]
    Upstream {
        /// HTTP status returned by the provider, if a response arrived.
        status: Option<u16>,
        /// What went wrong (status line or transport error).
        detail: String,
    },

    /// The upstream provider responded but had no rate for the requested
    /// currency or date.
    #[error("no rate found for currency {0}")]
    RateNotFound(String),

    /// Persistence layer failure on a read path.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::RateNotFound(_) => 2001,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
            Self::Upstream { .. } => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateNotFound(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            Self::Upstream {
                status: Some(code), ..
            } => Some(format!("upstream status {code}")),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_maps_to_bad_gateway() {
        let err = GatewayError::Upstream {
            status: Some(500),
            detail: "status 500".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_code(), 5001);
    }

    #[test]
    fn rate_not_found_maps_to_not_found() {
        let err = GatewayError::RateNotFound("JPY".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), 2001);
    }

    #[test]
    fn persistence_maps_to_internal() {
        let err = GatewayError::Persistence("connection refused".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
