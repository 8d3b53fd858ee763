//! Counter emitter: `inc` bumps a counter and publishes an `IncrementEvent`

use std::sync::{Arc, Mutex, PoisonError};

use axum::{Extension, Router, extract::State, routing::post};

use super::events::IncrementEvent;
use crate::api_auth::Caller;
use crate::core_types::Principal;
use crate::gateway::types::{RpcResult, ok};
use crate::hub::EventEmitter;

pub struct CounterEmitter {
    counter: Mutex<u64>,
    emitter: Arc<EventEmitter>,
}

impl CounterEmitter {
    pub fn new(emitter: Arc<EventEmitter>) -> Self {
        Self {
            counter: Mutex::new(0),
            emitter,
        }
    }

    /// Increment on behalf of `by` and publish the new value.
    pub fn inc(&self, by: Principal) -> RpcResult<u64> {
        // Held across emit so events leave in counter order
        let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
        *counter += 1;
        let current_value = *counter;

        self.emitter.emit(&IncrementEvent { by, current_value })?;
        tracing::debug!(%by, current_value, "counter incremented");
        ok(current_value)
    }

    pub fn value(&self) -> u64 {
        *self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn routes(self: Arc<Self>) -> Router {
        Router::new()
            .route("/inc", post(inc))
            .route("/get_counter_value", post(get_counter_value))
            .with_state(self)
    }
}

/// POST /rpc/inc
async fn inc(
    State(service): State<Arc<CounterEmitter>>,
    Extension(Caller(caller)): Extension<Caller>,
) -> RpcResult<u64> {
    service.inc(caller)
}

/// POST /rpc/get_counter_value
async fn get_counter_value(State(service): State<Arc<CounterEmitter>>) -> RpcResult<u64> {
    ok(service.value())
}
