//! Health check handler

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::super::types::ApiResponse;
use crate::core_types::{Principal, now_millis};

/// Build identifier: crate version plus the git hash captured at build time.
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

/// Static facts about the node, served by the health endpoint.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub principal: Principal,
    pub role: String,
}

/// Health check response data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
    /// Identity the node signs outgoing calls with
    pub principal: Principal,
    pub role: String,
    pub version: String,
}

/// GET /api/v1/health
///
/// Public. Listeners use it to learn which principal an emitter delivers with.
pub async fn health_check(State(info): State<Arc<NodeInfo>>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        timestamp_ms: now_millis(),
        principal: info.principal,
        role: info.role.clone(),
        version: VERSION.to_string(),
    }))
}
