//! Batch listener: counts the batches and `MirrorEvent`s it is sent

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::{Extension, Router, routing::post};

use super::events::MirrorEvent;
use super::upstream::{EVENTS_CALLBACK, EmitterLink};
use crate::api_auth::Caller;
use crate::core_types::Principal;
use crate::gateway::types::{RpcError, RpcResult, ok};
use crate::hub::codec::decode_batch_message;
use crate::hub::{DeliveryTarget, EventFilter, EventPayload, HubError};

pub struct BatchListener {
    events_received: AtomicU64,
    batches_received: AtomicU64,
    /// Every callback invocation, accepted or not
    callbacks_triggered: AtomicU64,
    link: EmitterLink,
}

impl BatchListener {
    pub fn new(link: EmitterLink) -> Self {
        Self {
            events_received: AtomicU64::new(0),
            batches_received: AtomicU64::new(0),
            callbacks_triggered: AtomicU64::new(0),
            link,
        }
    }

    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::SeqCst)
    }

    pub fn batches_received(&self) -> u64 {
        self.batches_received.load(Ordering::SeqCst)
    }

    pub fn callbacks_triggered(&self) -> u64 {
        self.callbacks_triggered.load(Ordering::SeqCst)
    }

    pub async fn start_listening(&self) -> Result<(), RpcError> {
        self.link.subscribe(EventFilter::empty()).await
    }

    pub fn on_batch(
        &self,
        from: &Principal,
        target: &DeliveryTarget,
        payload: &[u8],
    ) -> Result<(), RpcError> {
        self.callbacks_triggered.fetch_add(1, Ordering::SeqCst);
        self.link.verify_delivery(from, target)?;

        let events = decode_batch_message(payload).map_err(HubError::from)?;
        self.batches_received.fetch_add(1, Ordering::SeqCst);

        for event in events.into_iter().filter(|e| e.is::<MirrorEvent>()) {
            let ev = MirrorEvent::from_event(event).map_err(HubError::from)?;
            tracing::trace!(bytes = ev.data.len(), "got mirror event");
            self.events_received.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    pub fn routes(self: Arc<Self>) -> Router {
        Router::new()
            .route("/start_listening", post(start_listening))
            .route("/get_events_received", post(get_events_received))
            .route("/get_batches_received", post(get_batches_received))
            .route(
                "/get_times_events_callback_triggered",
                post(get_times_events_callback_triggered),
            )
            .route(&format!("/{}", EVENTS_CALLBACK), post(events_callback))
            .with_state(self)
    }
}

/// POST /rpc/start_listening
async fn start_listening(State(service): State<Arc<BatchListener>>) -> RpcResult<()> {
    service.start_listening().await?;
    ok(())
}

async fn get_events_received(State(service): State<Arc<BatchListener>>) -> RpcResult<u64> {
    ok(service.events_received())
}

async fn get_batches_received(State(service): State<Arc<BatchListener>>) -> RpcResult<u64> {
    ok(service.batches_received())
}

async fn get_times_events_callback_triggered(
    State(service): State<Arc<BatchListener>>,
) -> RpcResult<u64> {
    ok(service.callbacks_triggered())
}

/// POST /rpc/events_callback
async fn events_callback(
    State(service): State<Arc<BatchListener>>,
    Extension(Caller(caller)): Extension<Caller>,
    Query(target): Query<DeliveryTarget>,
    body: Bytes,
) -> RpcResult<()> {
    service.on_batch(&caller, &target, &body)?;
    ok(())
}
