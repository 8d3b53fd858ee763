//! Counter listener: mirrors the emitter's counter from `IncrementEvent`s
//!
//! In `All` mode it follows every increment. In `Caller` mode every
//! `start_listening` adds a filter pinned to that caller, so the listener
//! follows the increments of everyone who started it and nobody else.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::{Extension, Router, routing::post};

use super::events::{IncrementEvent, IncrementEventFilter};
use super::upstream::{EVENTS_CALLBACK, EmitterLink};
use crate::api_auth::Caller;
use crate::core_types::Principal;
use crate::gateway::types::{RpcError, RpcResult, ok};
use crate::hub::codec::decode_batch_message;
use crate::hub::{DeliveryTarget, EventPayload, HubError, TopicFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    /// Every increment
    All,
    /// Increments made by any principal that called `start_listening`
    Caller,
}

pub struct CounterListener {
    mode: ListenMode,
    counter: AtomicU64,
    link: EmitterLink,
}

impl CounterListener {
    pub fn new(mode: ListenMode, link: EmitterLink) -> Self {
        Self {
            mode,
            counter: AtomicU64::new(0),
            link,
        }
    }

    pub fn value(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    fn filter_for(&self, caller: Principal) -> IncrementEventFilter {
        match self.mode {
            ListenMode::All => IncrementEventFilter { by: None },
            ListenMode::Caller => IncrementEventFilter { by: Some(caller) },
        }
    }

    pub async fn start_listening(&self, caller: Principal) -> Result<(), RpcError> {
        let filter = self.filter_for(caller).to_event_filter().map_err(HubError::from)?;
        self.link.subscribe(filter).await
    }

    /// Apply a delivered batch. Returns how many increments it carried.
    pub fn on_batch(
        &self,
        from: &Principal,
        target: &DeliveryTarget,
        payload: &[u8],
    ) -> Result<usize, RpcError> {
        self.link.verify_delivery(from, target)?;
        let events = decode_batch_message(payload).map_err(HubError::from)?;

        let mut applied = 0;
        for event in events.into_iter().filter(|e| e.is::<IncrementEvent>()) {
            let ev = IncrementEvent::from_event(event).map_err(HubError::from)?;
            self.counter.store(ev.current_value, Ordering::SeqCst);
            applied += 1;
        }

        tracing::debug!(applied, value = self.value(), "increments applied");
        Ok(applied)
    }

    pub fn routes(self: Arc<Self>) -> Router {
        Router::new()
            .route("/start_listening", post(start_listening))
            .route("/get_counter_value", post(get_counter_value))
            .route(&format!("/{}", EVENTS_CALLBACK), post(events_callback))
            .with_state(self)
    }
}

/// POST /rpc/start_listening
async fn start_listening(
    State(service): State<Arc<CounterListener>>,
    Extension(Caller(caller)): Extension<Caller>,
) -> RpcResult<()> {
    service.start_listening(caller).await?;
    ok(())
}

/// POST /rpc/get_counter_value
async fn get_counter_value(State(service): State<Arc<CounterListener>>) -> RpcResult<u64> {
    ok(service.value())
}

/// POST /rpc/events_callback
async fn events_callback(
    State(service): State<Arc<CounterListener>>,
    Extension(Caller(caller)): Extension<Caller>,
    Query(target): Query<DeliveryTarget>,
    body: Bytes,
) -> RpcResult<()> {
    service.on_batch(&caller, &target, &body)?;
    ok(())
}
