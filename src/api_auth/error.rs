//! Rejections produced while authenticating a signed request.
//!
//! Every variant maps to a 40xx wire code and is rendered in the same
//! `ApiResponse` envelope handlers use, so clients decode one format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::core_types::PrincipalError;
use crate::gateway::types::ApiResponse;

/// Wire codes of authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AuthErrorCode {
    MalformedHeader = 4001,
    UnsupportedVersion = 4002,
    InvalidPrincipal = 4003,
    NonceReused = 4004,
    NonceOutOfWindow = 4005,
    BadSignature = 4006,
    BodyTooLarge = 4007,
}

impl AuthErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn http_status(self) -> StatusCode {
        match self {
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("malformed Authorization header: {0}")]
    Malformed(String),

    #[error("unsupported auth version '{0}'")]
    UnsupportedVersion(String),

    #[error(transparent)]
    InvalidPrincipal(#[from] PrincipalError),

    #[error("ts_nonce {0} was already used")]
    NonceReused(i64),

    #[error("ts_nonce {ts_nonce} is more than {window_ms}ms away from server time")]
    NonceOutOfWindow { ts_nonce: i64, window_ms: i64 },

    #[error("signature verification failed: {0}")]
    BadSignature(String),

    #[error("request body too large: {0}")]
    BodyTooLarge(String),
}

impl AuthError {
    pub fn code(&self) -> AuthErrorCode {
        match self {
            AuthError::MissingHeader | AuthError::Malformed(_) => AuthErrorCode::MalformedHeader,
            AuthError::UnsupportedVersion(_) => AuthErrorCode::UnsupportedVersion,
            AuthError::InvalidPrincipal(_) => AuthErrorCode::InvalidPrincipal,
            AuthError::NonceReused(_) => AuthErrorCode::NonceReused,
            AuthError::NonceOutOfWindow { .. } => AuthErrorCode::NonceOutOfWindow,
            AuthError::BadSignature(_) => AuthErrorCode::BadSignature,
            AuthError::BodyTooLarge(_) => AuthErrorCode::BodyTooLarge,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = self.code();
        tracing::debug!(code = code.code(), error = %self, "request rejected");
        let body = ApiResponse::<()>::error(code.code(), self.to_string());
        (code.http_status(), Json(body)).into_response()
    }
}
