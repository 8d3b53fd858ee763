//! Authentication middleware for Axum.
//!
//! Verifies the signed Authorization header of every RPC request and injects
//! the caller's [`Principal`] into request extensions.

use axum::body::{Body, to_bytes};
use axum::extract::{OriginalUri, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use super::{
    error::AuthError,
    signature::{parse_authorization, verify_signature},
    ts_store::TsStore,
};
use crate::core_types::{Principal, now_millis};

/// Authenticated caller, available to handlers as `Extension<Caller>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Principal);

/// Authentication state shared across requests.
#[derive(Clone)]
pub struct AuthState {
    /// Timestamp nonce store for replay protection
    pub ts_store: Arc<TsStore>,
    /// Time window for ts_nonce validation
    pub time_window_ms: i64,
    /// Largest body the middleware will buffer for signature checks
    pub max_body_bytes: usize,
}

impl AuthState {
    pub fn new(time_window_ms: i64, max_body_bytes: usize) -> Self {
        Self {
            ts_store: Arc::new(TsStore::new()),
            time_window_ms,
            max_body_bytes,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new(30_000, 16 * 1024 * 1024)
    }
}

/// Axum middleware for signed-request authentication.
///
/// The ts_nonce is only recorded once the signature checks out, so a forged
/// header cannot spend another principal's nonces.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let (mut parts, body) = request.into_parts();

    let auth_header = extract_auth_header(&parts.headers)?;
    let header = parse_authorization(auth_header)?;

    let body = to_bytes(body, auth_state.max_body_bytes)
        .await
        .map_err(|e| AuthError::BodyTooLarge(e.to_string()))?;

    let path = signed_path(&parts);
    verify_signature(&header, parts.method.as_str(), &path, &body)?;

    validate_ts_nonce(
        &auth_state.ts_store,
        &header.principal,
        header.ts_nonce,
        auth_state.time_window_ms,
    )?;

    let caller = Caller(header.principal);
    tracing::trace!(caller = %caller.0, %path, "request authenticated");

    parts.extensions.insert(caller);
    let request = Request::from_parts(parts, Body::from(body));

    Ok(next.run(request).await)
}

/// Path and query the client signed.
///
/// Nested routers strip their prefix from `uri`, `OriginalUri` keeps it.
fn signed_path(parts: &Parts) -> String {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or(&parts.uri);
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
        .to_string()
}

/// Validate ts_nonce is inside the time window and was not used before.
pub fn validate_ts_nonce(
    ts_store: &TsStore,
    principal: &Principal,
    ts_nonce: i64,
    time_window_ms: i64,
) -> Result<(), AuthError> {
    let now_ms = now_millis();

    if now_ms.abs_diff(ts_nonce) > time_window_ms.unsigned_abs() {
        return Err(AuthError::NonceOutOfWindow {
            ts_nonce,
            window_ms: time_window_ms,
        });
    }

    if !ts_store.check_and_record(principal, ts_nonce, now_ms.saturating_sub(time_window_ms)) {
        return Err(AuthError::NonceReused(ts_nonce));
    }

    Ok(())
}

/// Extract Authorization header from request.
pub fn extract_auth_header(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingHeader)
}
