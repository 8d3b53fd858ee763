//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `error_codes`: Standard error code constants
//! - `RpcError`: handler error, rendered as an `ApiResponse`

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hub::HubError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    pub code: i32,
    /// Response message
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Handler result: success body or an [`RpcError`].
pub type RpcResult<T> = Result<Json<ApiResponse<T>>, RpcError>;

/// Wrap a handler's return value.
pub fn ok<T>(data: T) -> RpcResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;

    // Permission errors (2xxx)
    pub const PERMISSION_DENIED: i32 = 2003;

    // Event hub errors (3xxx)
    pub const NO_ACTIVE_LISTENERS: i32 = 3001;
    pub const EVENT_TOO_BIG: i32 = 3002;
    pub const NO_SUCH_FILTER: i32 = 3003;
    pub const NO_SUCH_LISTENER: i32 = 3004;
    pub const CODEC_ERROR: i32 = 3005;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const UPSTREAM_ERROR: i32 = 5002;
}

// ============================================================================
// RpcError
// ============================================================================

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::InvalidParameter(_) => error_codes::INVALID_PARAMETER,
            RpcError::PermissionDenied(_) => error_codes::PERMISSION_DENIED,
            RpcError::Hub(e) => match e {
                HubError::EventHasNoActiveListeners => error_codes::NO_ACTIVE_LISTENERS,
                HubError::EventIsTooBig { .. } => error_codes::EVENT_TOO_BIG,
                HubError::NoSuchFilter => error_codes::NO_SUCH_FILTER,
                HubError::NoSuchListener => error_codes::NO_SUCH_LISTENER,
                HubError::Codec(_) => error_codes::CODEC_ERROR,
            },
            RpcError::Upstream(_) => error_codes::UPSTREAM_ERROR,
            RpcError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            RpcError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            RpcError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            RpcError::Hub(HubError::Codec(_)) => StatusCode::BAD_REQUEST,
            RpcError::Hub(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RpcError::Upstream(_) => StatusCode::BAD_GATEWAY,
            RpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "rpc failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "rpc rejected");
        }
        let body = ApiResponse::<()>::error(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_roundtrip() {
        let json = serde_json::to_string(&ApiResponse::success(5u64)).unwrap();
        assert_eq!(json, r#"{"code":0,"msg":"ok","data":5}"#);

        let back: ApiResponse<u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.data, Some(5));
    }

    #[test]
    fn test_error_omits_data() {
        let json = serde_json::to_string(&ApiResponse::<()>::error(1001, "bad")).unwrap();
        assert_eq!(json, r#"{"code":1001,"msg":"bad"}"#);

        let back: ApiResponse<u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code, 1001);
        assert!(back.data.is_none());
    }

    #[test]
    fn test_hub_error_codes() {
        assert_eq!(
            RpcError::from(HubError::NoSuchFilter).code(),
            error_codes::NO_SUCH_FILTER
        );
        let too_big = RpcError::from(HubError::EventIsTooBig { size: 10, max: 5 });
        assert_eq!(too_big.code(), error_codes::EVENT_TOO_BIG);
        assert_eq!(too_big.http_status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_permission_denied_status() {
        let err = RpcError::PermissionDenied("not an admin".into());
        assert_eq!(err.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), 2003);
    }
}
