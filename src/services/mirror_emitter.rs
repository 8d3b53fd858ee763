//! Mirror emitter: publishes every `mirror` payload as a `MirrorEvent`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use super::events::MirrorEvent;
use crate::gateway::types::{RpcResult, ok};
use crate::hub::EventEmitter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorRequest {
    pub data: Vec<u8>,
}

pub struct MirrorEmitter {
    requests: AtomicU64,
    emitter: Arc<EventEmitter>,
}

impl MirrorEmitter {
    pub fn new(emitter: Arc<EventEmitter>) -> Self {
        Self {
            requests: AtomicU64::new(0),
            emitter,
        }
    }

    pub fn requests_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn routes(self: Arc<Self>) -> Router {
        Router::new()
            .route("/mirror", post(mirror))
            .route("/get_requests_count", post(get_requests_count))
            .with_state(self)
    }
}

/// POST /rpc/mirror
async fn mirror(
    State(service): State<Arc<MirrorEmitter>>,
    Json(req): Json<MirrorRequest>,
) -> RpcResult<()> {
    service.requests.fetch_add(1, Ordering::SeqCst);
    service.emitter.emit(&MirrorEvent { data: req.data })?;
    ok(())
}

/// POST /rpc/get_requests_count
async fn get_requests_count(State(service): State<Arc<MirrorEmitter>>) -> RpcResult<u64> {
    ok(service.requests_count())
}
