//! EventEmitter - the runtime half of the hub
//!
//! Wraps an [`EventHub`] with a delivery backend. Services call [`EventEmitter::emit`]
//! from request handlers; a heartbeat task periodically seals due batches and
//! ships them with [`EventEmitter::send_events`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{MissedTickBehavior, interval};

use super::codec::encode_batch_message;
use super::delivery::EventDelivery;
use super::event_hub::{EventHub, HubError, HubStats};
use super::types::{
    AddEventListenersRequest, BecomeEventListenerRequest, EncodedEventBatch, EventPayload,
    GetEventListenersRequest, GetEventListenersResponse, RemoteCallEndpoint,
    RemoveEventListenersRequest, RemoveEventListenersResponse, StopBeingEventListenerRequest,
    StopBeingEventListenerResponse,
};
use crate::core_types::{Principal, TimestampNanos, now_nanos};
use crate::shutdown::ShutdownSignal;

/// Outcome of one delivery round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Batches handed to the delivery backend
    pub batches: usize,
    /// Events contained in those batches
    pub events: usize,
    /// Batches whose delivery failed (dropped, not retried)
    pub failed: usize,
}

/// Lifetime counters.
#[derive(Debug, Default)]
pub struct EmitterStats {
    pub events_emitted: AtomicU64,
    pub events_dropped: AtomicU64,
    pub batches_delivered: AtomicU64,
    pub delivery_failures: AtomicU64,
}

pub struct EventEmitter {
    hub: Mutex<EventHub>,
    delivery: Arc<dyn EventDelivery>,
    stats: EmitterStats,
}

impl EventEmitter {
    pub fn new(hub: EventHub, delivery: Arc<dyn EventDelivery>) -> Self {
        Self {
            hub: Mutex::new(hub),
            delivery,
            stats: EmitterStats::default(),
        }
    }

    fn hub(&self) -> MutexGuard<'_, EventHub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> &EmitterStats {
        &self.stats
    }

    pub fn hub_stats(&self) -> HubStats {
        self.hub().stats()
    }

    pub fn set_batch_making_duration(&self, duration: Duration) {
        self.hub()
            .set_batch_making_duration_nanos(duration.as_nanos() as u64);
    }

    pub fn set_max_batch_size(&self, max: usize) {
        self.hub().set_max_batch_size(max);
    }

    // ------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------

    /// Queue an event for every matching listener.
    ///
    /// An event nobody listens to is dropped and reported as `Ok(0)`.
    pub fn emit<E: EventPayload>(&self, event: &E) -> Result<usize, HubError> {
        self.emit_at(event, now_nanos())
    }

    pub fn emit_at<E: EventPayload>(
        &self,
        event: &E,
        timestamp: TimestampNanos,
    ) -> Result<usize, HubError> {
        let event = event.to_event()?;
        let result = self.hub().push_pending_event(&event, timestamp);

        match result {
            Ok(count) => {
                self.stats.events_emitted.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(event = E::NAME, listeners = count, "event queued");
                Ok(count)
            }
            Err(HubError::EventHasNoActiveListeners) => {
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(event = E::NAME, "event has no active listeners, dropped");
                Ok(0)
            }
            Err(e) => {
                tracing::warn!(event = E::NAME, error = %e, "event rejected");
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    /// Seal batches that are due and deliver every ready batch.
    pub async fn send_events(&self) -> DeliveryReport {
        self.send_events_at(now_nanos()).await
    }

    pub async fn send_events_at(&self, now: TimestampNanos) -> DeliveryReport {
        let ready = {
            let mut hub = self.hub();
            hub.transform_pending_to_ready_by_time(now);
            Self::drain_ready(&mut hub)
        };
        self.deliver_all(ready).await
    }

    /// Seal every open batch and deliver, regardless of age.
    pub async fn flush(&self) -> DeliveryReport {
        let ready = {
            let mut hub = self.hub();
            hub.flush_all();
            Self::drain_ready(&mut hub)
        };
        self.deliver_all(ready).await
    }

    fn drain_ready(hub: &mut EventHub) -> Vec<(RemoteCallEndpoint, Vec<EncodedEventBatch>)> {
        let mut ready = Vec::new();
        while let Some(entry) = hub.pop_ready_batches() {
            ready.push(entry);
        }
        ready
    }

    /// Endpoints are served concurrently; batches for one endpoint go out in order.
    async fn deliver_all(
        &self,
        ready: Vec<(RemoteCallEndpoint, Vec<EncodedEventBatch>)>,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if ready.is_empty() {
            return report;
        }

        let deliveries = ready.into_iter().map(|(endpoint, batches)| {
            let delivery = Arc::clone(&self.delivery);
            async move {
                let mut results = Vec::with_capacity(batches.len());
                for batch in batches {
                    let result = delivery
                        .deliver(&endpoint, encode_batch_message(&batch))
                        .await;
                    results.push((batch.events_count, result));
                }
                (endpoint, results)
            }
        });

        for (endpoint, results) in join_all(deliveries).await {
            for (events, result) in results {
                report.batches += 1;
                report.events += events;
                match result {
                    Ok(()) => {
                        self.stats.batches_delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        report.failed += 1;
                        self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            url = %endpoint.url,
                            method = %endpoint.method_name,
                            events,
                            error = %e,
                            "batch delivery failed"
                        );
                    }
                }
            }
        }

        tracing::debug!(
            batches = report.batches,
            events = report.events,
            failed = report.failed,
            "delivery round finished"
        );
        report
    }

    /// Periodic delivery loop. Flushes whatever is pending once shutdown is requested.
    pub async fn run_heartbeat(self: Arc<Self>, period: Duration, shutdown: Arc<ShutdownSignal>) {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_ms = period.as_millis() as u64, "[EventEmitter] heartbeat started");

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.send_events().await;
                }
                _ = shutdown.wait() => break,
            }
        }

        let report = self.flush().await;
        tracing::info!(
            batches = report.batches,
            failed = report.failed,
            "[EventEmitter] heartbeat stopped"
        );
    }

    // ------------------------------------------------------------------
    // Listener management
    // ------------------------------------------------------------------

    pub fn add_event_listeners(&self, req: AddEventListenersRequest) {
        let mut hub = self.hub();
        for listener in req.listeners {
            hub.add_event_listener(listener.filter, listener.endpoint);
        }
    }

    pub fn remove_event_listeners(
        &self,
        req: RemoveEventListenersRequest,
    ) -> RemoveEventListenersResponse {
        let mut hub = self.hub();
        let results = req
            .listeners
            .iter()
            .map(|l| {
                hub.remove_event_listener(&l.filter, &l.endpoint)
                    .map_err(|e| e.to_string())
            })
            .collect();
        RemoveEventListenersResponse { results }
    }

    /// Subscribe the caller itself; callbacks go to `req.callback_url`.
    pub fn become_event_listener(&self, caller: Principal, req: BecomeEventListenerRequest) {
        let mut hub = self.hub();
        for listener in req.listeners {
            let endpoint = RemoteCallEndpoint {
                principal: caller,
                url: req.callback_url.clone(),
                method_name: listener.callback_method_name,
            };
            tracing::info!(listener = %caller, url = %endpoint.url, "listener subscribed");
            hub.add_event_listener(listener.filter, endpoint);
        }
    }

    pub fn stop_being_event_listener(
        &self,
        caller: Principal,
        req: StopBeingEventListenerRequest,
    ) -> StopBeingEventListenerResponse {
        let mut hub = self.hub();
        let results = req
            .listeners
            .into_iter()
            .map(|listener| {
                let endpoint = RemoteCallEndpoint {
                    principal: caller,
                    url: req.callback_url.clone(),
                    method_name: listener.callback_method_name,
                };
                hub.remove_event_listener(&listener.filter, &endpoint)
                    .map_err(|e| e.to_string())
            })
            .collect();
        StopBeingEventListenerResponse { results }
    }

    pub fn get_event_listeners(&self, req: GetEventListenersRequest) -> GetEventListenersResponse {
        let hub = self.hub();
        GetEventListenersResponse {
            listeners: req
                .filters
                .iter()
                .map(|f| hub.match_event_listeners(f))
                .collect(),
        }
    }
}
