//! Service node: one service, its hub (for emitters) and its HTTP surface
//!
//! `ServiceNode::start` is the deployment step. It binds the socket, wires the
//! service for its role and returns once the node accepts requests, so callers
//! can build clients against [`ServiceNode::url`] right away.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::api_auth::AuthState;
use crate::config::AppConfig;
use crate::core_types::{Identity, Principal};
use crate::gateway::handlers::{HubRpcState, NodeInfo, hub_routes};
use crate::gateway::{build_app, serve};
use crate::hub::{DeliveryError, EventEmitter, EventHub, HttpDelivery};
use crate::services::{
    BatchListener, CounterEmitter, CounterListener, EmitterLink, ListenMode, MirrorEmitter,
    ServiceRole,
};
use crate::shutdown::ShutdownSignal;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("role {0} needs service.emitter_url")]
    MissingEmitterUrl(ServiceRole),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

pub struct ServiceNode {
    role: ServiceRole,
    addr: SocketAddr,
    url: String,
    identity: Identity,
    emitter: Option<Arc<EventEmitter>>,
    shutdown: Arc<ShutdownSignal>,
    server: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl ServiceNode {
    pub async fn start(
        role: ServiceRole,
        config: &AppConfig,
        identity: Identity,
    ) -> Result<Self, NodeError> {
        let bind_addr = format!("{}:{}", config.gateway.host, config.gateway.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| NodeError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| NodeError::Bind {
            addr: bind_addr,
            source,
        })?;
        let url = config
            .service
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", addr));

        let shutdown = Arc::new(ShutdownSignal::new());

        let (rpc_routes, emitter) = if role.is_emitter() {
            let emitter = Arc::new(build_emitter(config, &identity)?);
            (emitter_routes(role, config, &emitter), Some(emitter))
        } else {
            let emitter_url = config
                .service
                .emitter_url
                .as_deref()
                .ok_or(NodeError::MissingEmitterUrl(role))?;
            let link = EmitterLink::new(emitter_url, identity.clone(), url.clone());
            (listener_routes(role, link), None)
        };

        let heartbeat = emitter.as_ref().map(|emitter| {
            tokio::spawn(Arc::clone(emitter).run_heartbeat(
                config.hub.heartbeat_interval(),
                Arc::clone(&shutdown),
            ))
        });

        let auth_state = Arc::new(AuthState::new(
            config.auth.time_window_ms,
            config.auth.max_body_bytes,
        ));
        let info = Arc::new(NodeInfo {
            principal: identity.principal(),
            role: role.to_string(),
        });
        let app = build_app(rpc_routes, auth_state, info);

        let server_shutdown = Arc::clone(&shutdown);
        let server = tokio::spawn(async move {
            if let Err(e) = serve(listener, app, server_shutdown).await {
                tracing::error!(error = %e, "server error");
            }
        });

        tracing::info!(%role, %url, principal = %identity.principal(), "node started");

        Ok(Self {
            role,
            addr,
            url,
            identity,
            emitter,
            shutdown,
            server,
            heartbeat,
        })
    }

    pub fn role(&self) -> ServiceRole {
        self.role
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL clients should use.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn principal(&self) -> Principal {
        self.identity.principal()
    }

    /// Hub runtime, present on emitter nodes.
    pub fn emitter(&self) -> Option<&Arc<EventEmitter>> {
        self.emitter.as_ref()
    }

    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown)
    }

    /// Wait until the node stops on its own, e.g. after a signal handler
    /// requested shutdown through [`ServiceNode::shutdown_signal`].
    pub async fn wait(self) {
        self.shutdown.wait().await;
        self.shutdown().await;
    }

    /// Deliver pending batches, then stop serving.
    pub async fn shutdown(self) {
        self.shutdown.request_shutdown();

        if let Some(heartbeat) = self.heartbeat {
            if let Err(e) = heartbeat.await {
                tracing::warn!(error = %e, "heartbeat task failed");
            }
        }
        if let Err(e) = self.server.await {
            tracing::warn!(error = %e, "server task failed");
        }
        tracing::info!(role = %self.role, url = %self.url, "node stopped");
    }
}

fn build_emitter(config: &AppConfig, identity: &Identity) -> Result<EventEmitter, NodeError> {
    let hub = EventHub::new(
        config.hub.batch_making_duration().as_nanos() as u64,
        config.hub.batch_max_size_bytes,
    );
    let delivery = HttpDelivery::new(identity.clone(), config.hub.delivery_timeout())?;
    Ok(EventEmitter::new(hub, Arc::new(delivery)))
}

fn emitter_routes(role: ServiceRole, config: &AppConfig, emitter: &Arc<EventEmitter>) -> Router {
    let service = match role {
        ServiceRole::MirrorEmitter => Arc::new(MirrorEmitter::new(Arc::clone(emitter))).routes(),
        _ => Arc::new(CounterEmitter::new(Arc::clone(emitter))).routes(),
    };
    let hub = hub_routes(Arc::new(HubRpcState {
        emitter: Arc::clone(emitter),
        admins: config.hub.admins.clone(),
    }));
    service.merge(hub)
}

fn listener_routes(role: ServiceRole, link: EmitterLink) -> Router {
    match role {
        ServiceRole::CounterListenerCaller => {
            Arc::new(CounterListener::new(ListenMode::Caller, link)).routes()
        }
        ServiceRole::BatchListener => Arc::new(BatchListener::new(link)).routes(),
        _ => Arc::new(CounterListener::new(ListenMode::All, link)).routes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ServiceClient;

    #[tokio::test]
    async fn test_listener_without_emitter_url_fails() {
        let err = ServiceNode::start(
            ServiceRole::BatchListener,
            &AppConfig::default(),
            Identity::generate(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, NodeError::MissingEmitterUrl(ServiceRole::BatchListener)));
    }

    #[tokio::test]
    async fn test_health_reports_identity_and_role() {
        let identity = Identity::generate();
        let node = ServiceNode::start(
            ServiceRole::CounterEmitter,
            &AppConfig::default(),
            identity.clone(),
        )
        .await
        .unwrap();

        let health = ServiceClient::new(node.url(), Identity::generate())
            .health()
            .await
            .unwrap();
        assert_eq!(health.principal, identity.principal());
        assert_eq!(health.role, "counter-emitter");
        assert_eq!(node.addr().ip().to_string(), "127.0.0.1");

        node.shutdown().await;
    }
}
