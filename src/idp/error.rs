//! OAuth-surface errors returned by the provider endpoints.
//!
//! Error bodies follow RFC 6749 §5.2: `{"error": <code>,
//! "error_description": <text>}`. Every error is terminal for the current
//! request; nothing in this service retries.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// OAuth 2.0 error response body per RFC 6749 §5.2.
#[derive(Debug, Serialize)]
pub struct OauthErrorBody {
    /// Machine-readable error code
    pub error: &'static str,
    /// Human-readable description
    pub error_description: String,
}

/// Errors surfaced by the authorize, token, and userinfo endpoints.
#[derive(Debug, Error)]
pub enum OauthError {
    /// Missing or invalid required parameters (400, no state mutation)
    #[error("invalid_request: {0}")]
    MalformedRequest(String),

    /// Unsupported grant or response type (400)
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    /// Unknown relying party or bad client secret (400-class)
    #[error("invalid_client: {0}")]
    InvalidClient(String),

    /// Unknown, expired, or already-consumed code (400, security-relevant)
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// Principal vanished between code issuance and exchange (400)
    #[error("invalid_grant: principal not found: {0}")]
    PrincipalNotFound(String),

    /// Bad or expired access token at userinfo (401)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal failure (500); fails the exchange closed
    #[error("server_error: {0}")]
    Internal(String),
}

impl OauthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "invalid_request",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) | Self::PrincipalNotFound(_) => "invalid_grant",
            Self::Unauthorized(_) => "unauthorized",
            Self::Internal(_) => "server_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_)
            | Self::UnsupportedGrantType(_)
            | Self::InvalidClient(_)
            | Self::InvalidGrant(_)
            | Self::PrincipalNotFound(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn description(&self) -> String {
        match self {
            Self::MalformedRequest(s)
            | Self::UnsupportedGrantType(s)
            | Self::InvalidClient(s)
            | Self::InvalidGrant(s)
            | Self::Unauthorized(s)
            | Self::Internal(s) => s.clone(),
            Self::PrincipalNotFound(s) => format!("principal not found: {s}"),
        }
    }
}

impl IntoResponse for OauthError {
    fn into_response(self) -> Response {
        let body = OauthErrorBody {
            error: self.error_code(),
            error_description: self.description(),
        };

        match self {
            // RFC 6750 bearer-token errors challenge the client
            Self::Unauthorized(_) => (
                self.status_code(),
                [("WWW-Authenticate", "Bearer")],
                Json(body),
            )
                .into_response(),
            _ => (self.status_code(), Json(body)).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_follow_rfc_6749() {
        assert_eq!(
            OauthError::MalformedRequest("x".into()).error_code(),
            "invalid_request"
        );
        assert_eq!(
            OauthError::InvalidGrant("x".into()).error_code(),
            "invalid_grant"
        );
        assert_eq!(
            OauthError::PrincipalNotFound("u-1".into()).error_code(),
            "invalid_grant"
        );
        assert_eq!(
            OauthError::UnsupportedGrantType("x".into()).error_code(),
            "unsupported_grant_type"
        );
    }

    #[test]
    fn grant_errors_map_to_400_and_auth_errors_to_401() {
        assert_eq!(
            OauthError::InvalidGrant("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OauthError::InvalidClient("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OauthError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
