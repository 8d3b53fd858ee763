pub mod handlers;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::get,
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::api_auth::{AuthState, auth_middleware};
use crate::shutdown::ShutdownSignal;
use handlers::{NodeInfo, health_check};

/// Assemble the node's HTTP surface.
///
/// `rpc_routes` are mounted under `/rpc` behind signed-request authentication;
/// the health endpoint stays public.
pub fn build_app(rpc_routes: Router, auth_state: Arc<AuthState>, info: Arc<NodeInfo>) -> Router {
    let private_routes = rpc_routes.layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .route("/api/v1/health", get(health_check))
        .with_state(info)
        .nest("/rpc", private_routes)
}

/// Serve `app` until `shutdown` is requested.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: Arc<ShutdownSignal>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    tracing::info!(%addr, "gateway stopped");
    Ok(())
}
