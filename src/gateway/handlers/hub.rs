//! Listener management RPCs served by emitter nodes

use std::sync::Arc;

use axum::{Extension, Json, Router, extract::State, routing::post};

use crate::gateway::types::{RpcError, RpcResult, ok};
use crate::api_auth::Caller;
use crate::core_types::Principal;
use crate::hub::{
    AddEventListenersRequest, BecomeEventListenerRequest, EventEmitter, GetEventListenersRequest,
    GetEventListenersResponse, RemoveEventListenersRequest, RemoveEventListenersResponse,
    StopBeingEventListenerRequest, StopBeingEventListenerResponse,
};

pub struct HubRpcState {
    pub emitter: Arc<EventEmitter>,
    /// Principals allowed to manage listeners on behalf of other endpoints
    pub admins: Vec<Principal>,
}

impl HubRpcState {
    fn ensure_admin(&self, caller: &Principal) -> Result<(), RpcError> {
        if self.admins.contains(caller) {
            return Ok(());
        }
        #[cfg(feature = "open-admin")]
        if self.admins.is_empty() {
            return Ok(());
        }
        Err(RpcError::PermissionDenied(format!(
            "{} may not manage other listeners",
            caller
        )))
    }
}

/// Routes relative to `/rpc`.
pub fn hub_routes(state: Arc<HubRpcState>) -> Router {
    Router::new()
        .route("/_become_event_listener", post(become_event_listener))
        .route("/_stop_being_event_listener", post(stop_being_event_listener))
        .route("/_get_event_listeners", post(get_event_listeners))
        .route("/_add_event_listeners", post(add_event_listeners))
        .route("/_remove_event_listeners", post(remove_event_listeners))
        .with_state(state)
}

/// POST /rpc/_become_event_listener
pub async fn become_event_listener(
    State(state): State<Arc<HubRpcState>>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(req): Json<BecomeEventListenerRequest>,
) -> RpcResult<()> {
    if req.callback_url.is_empty() {
        return Err(RpcError::InvalidParameter("callback_url is empty".into()));
    }
    state.emitter.become_event_listener(caller, req);
    ok(())
}

/// POST /rpc/_stop_being_event_listener
pub async fn stop_being_event_listener(
    State(state): State<Arc<HubRpcState>>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(req): Json<StopBeingEventListenerRequest>,
) -> RpcResult<StopBeingEventListenerResponse> {
    ok(state.emitter.stop_being_event_listener(caller, req))
}

/// POST /rpc/_get_event_listeners
pub async fn get_event_listeners(
    State(state): State<Arc<HubRpcState>>,
    Json(req): Json<GetEventListenersRequest>,
) -> RpcResult<GetEventListenersResponse> {
    ok(state.emitter.get_event_listeners(req))
}

/// POST /rpc/_add_event_listeners (admin)
pub async fn add_event_listeners(
    State(state): State<Arc<HubRpcState>>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(req): Json<AddEventListenersRequest>,
) -> RpcResult<()> {
    state.ensure_admin(&caller)?;
    state.emitter.add_event_listeners(req);
    ok(())
}

/// POST /rpc/_remove_event_listeners (admin)
pub async fn remove_event_listeners(
    State(state): State<Arc<HubRpcState>>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(req): Json<RemoveEventListenersRequest>,
) -> RpcResult<RemoveEventListenersResponse> {
    state.ensure_admin(&caller)?;
    ok(state.emitter.remove_event_listeners(req))
}
