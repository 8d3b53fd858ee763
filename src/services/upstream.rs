//! Link from a listener service to the emitter it subscribes to

use once_cell::sync::OnceCell;

use crate::client::EventHubClient;
use crate::core_types::{Identity, Principal};
use crate::gateway::types::RpcError;
use crate::hub::{BecomeEventListenerRequest, DeliveryTarget, EventFilter, EventListener};

/// Callback method every demo listener exposes.
pub const EVENTS_CALLBACK: &str = "events_callback";

pub struct EmitterLink {
    hub: EventHubClient,
    /// Base URL this listener serves callbacks on
    callback_url: String,
    /// Learned from the emitter's health endpoint on first subscription
    emitter_principal: OnceCell<Principal>,
}

impl EmitterLink {
    pub fn new(emitter_url: &str, identity: Identity, callback_url: String) -> Self {
        Self {
            hub: EventHubClient::new(emitter_url, identity),
            callback_url,
            emitter_principal: OnceCell::new(),
        }
    }

    pub fn emitter_url(&self) -> &str {
        self.hub.service().base_url()
    }

    pub fn emitter_principal(&self) -> Option<Principal> {
        self.emitter_principal.get().copied()
    }

    /// Register this listener's `events_callback` with the emitter under `filter`.
    pub async fn subscribe(&self, filter: EventFilter) -> Result<(), RpcError> {
        let health = self
            .hub
            .service()
            .health()
            .await
            .map_err(|e| RpcError::Upstream(e.to_string()))?;

        let known = *self.emitter_principal.get_or_init(|| health.principal);
        if known != health.principal {
            return Err(RpcError::Upstream(format!(
                "emitter at {} changed identity from {} to {}",
                self.emitter_url(),
                known,
                health.principal
            )));
        }

        self.hub
            .become_event_listener(&BecomeEventListenerRequest {
                listeners: vec![EventListener {
                    filter,
                    callback_method_name: EVENTS_CALLBACK.to_string(),
                }],
                callback_url: self.callback_url.clone(),
            })
            .await
            .map_err(|e| RpcError::Upstream(e.to_string()))?;

        tracing::info!(emitter = %known, url = self.emitter_url(), "subscribed to emitter");
        Ok(())
    }

    /// Principal this listener subscribes as.
    pub fn principal(&self) -> Principal {
        self.hub.service().principal()
    }

    /// Only the subscribed emitter may deliver batches, and only batches
    /// addressed to this listener's own subscriptions are accepted.
    pub fn verify_delivery(
        &self,
        caller: &Principal,
        target: &DeliveryTarget,
    ) -> Result<(), RpcError> {
        match self.emitter_principal.get() {
            Some(emitter) if emitter == caller => {}
            Some(_) => {
                return Err(RpcError::PermissionDenied(format!(
                    "{} is not the subscribed emitter",
                    caller
                )));
            }
            None => {
                return Err(RpcError::PermissionDenied(
                    "not listening to any emitter yet".to_string(),
                ));
            }
        }

        let own = self.principal();
        match target.to {
            Some(to) if to == own => Ok(()),
            Some(to) => Err(RpcError::PermissionDenied(format!(
                "batch addressed to {}, not to {}",
                to, own
            ))),
            None => Err(RpcError::PermissionDenied("batch has no recipient".to_string())),
        }
    }
}
