//! EventHub - listener index and per-endpoint batch builder
//!
//! Single-threaded state machine; `EventEmitter` wraps it in a mutex.
//!
//! Batch lifecycle per endpoint:
//!
//! ```text
//!   push ──▶ [open batch] ──size overflow──▶ [ready] ──pop──▶ delivery
//!                 │                            ▲
//!                 └──── age >= duration ───────┘
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, hash_map};

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use super::codec::{self, CodecError};
use super::types::{EncodedEventBatch, Event, EventField, EventFilter, RemoteCallEndpoint};
use crate::core_types::TimestampNanos;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("event has no active listeners")]
    EventHasNoActiveListeners,

    #[error("event is too big: {size} bytes, batch limit is {max} bytes")]
    EventIsTooBig { size: usize, max: usize },

    #[error("No such filter")]
    NoSuchFilter,

    #[error("No such listener in that filter")]
    NoSuchListener,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl HubError {
    pub fn code(&self) -> &'static str {
        match self {
            HubError::EventHasNoActiveListeners => "NO_ACTIVE_LISTENERS",
            HubError::EventIsTooBig { .. } => "EVENT_TOO_BIG",
            HubError::NoSuchFilter => "NO_SUCH_FILTER",
            HubError::NoSuchListener => "NO_SUCH_LISTENER",
            HubError::Codec(_) => "CODEC_ERROR",
        }
    }
}

/// Open batch waiting for its age deadline.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct QueuedBatch {
    timestamp: TimestampNanos,
    seq: u64,
    endpoint: RemoteCallEndpoint,
}

/// Counters for logging and health output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub filters: usize,
    pub listeners: usize,
    pub pending_batches: usize,
    pub ready_batches: usize,
}

/// A struct that associates event topics with subscribed listeners
pub struct EventHub {
    batch_making_duration_nanos: u64,
    batch_max_size_bytes: usize,
    listeners: FxHashMap<EventFilter, FxHashSet<RemoteCallEndpoint>>,
    pending_batch: FxHashMap<RemoteCallEndpoint, EncodedEventBatch>,
    pending_batch_queue: BinaryHeap<Reverse<QueuedBatch>>,
    ready_batches: BTreeMap<RemoteCallEndpoint, Vec<EncodedEventBatch>>,
    next_seq: u64,
}

impl EventHub {
    pub fn new(batch_making_duration_nanos: u64, batch_max_size_bytes: usize) -> Self {
        Self {
            batch_making_duration_nanos,
            batch_max_size_bytes,
            listeners: FxHashMap::default(),
            pending_batch: FxHashMap::default(),
            pending_batch_queue: BinaryHeap::new(),
            ready_batches: BTreeMap::new(),
            next_seq: 1,
        }
    }

    pub fn set_batch_making_duration_nanos(&mut self, new_duration: u64) {
        self.batch_making_duration_nanos = new_duration;
    }

    pub fn set_max_batch_size(&mut self, max: usize) {
        self.batch_max_size_bytes = max;
    }

    pub fn batch_making_duration_nanos(&self) -> u64 {
        self.batch_making_duration_nanos
    }

    pub fn batch_max_size_bytes(&self) -> usize {
        self.batch_max_size_bytes
    }

    // ------------------------------------------------------------------
    // Listener index
    // ------------------------------------------------------------------

    /// Register `endpoint` under `filter`. Registering twice is a no-op.
    pub fn add_event_listener(&mut self, filter: EventFilter, endpoint: RemoteCallEndpoint) {
        self.listeners.entry(filter).or_default().insert(endpoint);
    }

    pub fn remove_event_listener(
        &mut self,
        filter: &EventFilter,
        endpoint: &RemoteCallEndpoint,
    ) -> Result<(), HubError> {
        let listeners = self
            .listeners
            .get_mut(filter)
            .ok_or(HubError::NoSuchFilter)?;

        if !listeners.remove(endpoint) {
            return Err(HubError::NoSuchListener);
        }

        if listeners.is_empty() {
            self.listeners.remove(filter);
        }

        Ok(())
    }

    /// Endpoints that would receive an event carrying exactly the filter's topics.
    pub fn match_event_listeners(&self, filter: &EventFilter) -> Vec<RemoteCallEndpoint> {
        self.match_event_listeners_by_topics(&filter.0)
    }

    /// Endpoints whose filter is a subset of `topics`, each reported once.
    pub fn match_event_listeners_by_topics(
        &self,
        topics: &BTreeSet<EventField>,
    ) -> Vec<RemoteCallEndpoint> {
        let matched: BTreeSet<&RemoteCallEndpoint> = self
            .listeners
            .iter()
            .filter(|(filter, _)| filter.matches(topics))
            .flat_map(|(_, endpoints)| endpoints.iter())
            .collect();

        matched.into_iter().cloned().collect()
    }

    pub fn get_listeners(&self) -> &FxHashMap<EventFilter, FxHashSet<RemoteCallEndpoint>> {
        &self.listeners
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            filters: self.listeners.len(),
            listeners: self.listeners.values().map(|s| s.len()).sum(),
            pending_batches: self.pending_batch.len(),
            ready_batches: self.ready_batches.values().map(|v| v.len()).sum(),
        }
    }

    // ------------------------------------------------------------------
    // Batching
    // ------------------------------------------------------------------

    /// Queue `event` for every matching listener.
    ///
    /// Returns the number of listeners the event was queued for.
    pub fn push_pending_event(
        &mut self,
        event: &Event,
        timestamp: TimestampNanos,
    ) -> Result<usize, HubError> {
        let listeners = self.match_event_listeners_by_topics(&event.topics);

        if listeners.is_empty() {
            return Err(HubError::EventHasNoActiveListeners);
        }

        let encoded = codec::encode_event(event)?;

        if encoded.len() >= self.batch_max_size_bytes {
            return Err(HubError::EventIsTooBig {
                size: encoded.len(),
                max: self.batch_max_size_bytes,
            });
        }

        let count = listeners.len();

        for listener in listeners {
            match self.pending_batch.entry(listener) {
                hash_map::Entry::Vacant(e) => {
                    let seq = self.next_seq;
                    self.next_seq += 1;

                    self.pending_batch_queue.push(Reverse(QueuedBatch {
                        timestamp,
                        seq,
                        endpoint: e.key().clone(),
                    }));
                    e.insert(EncodedEventBatch::new(&encoded, timestamp, seq));
                }
                hash_map::Entry::Occupied(mut e) => {
                    let total_size_bytes = e.get().content.len() + encoded.len();

                    if total_size_bytes <= self.batch_max_size_bytes {
                        e.get_mut().add_event(&encoded);
                    } else {
                        let seq = self.next_seq;
                        self.next_seq += 1;

                        let endpoint = e.key().clone();
                        let old_batch = e.insert(EncodedEventBatch::new(&encoded, timestamp, seq));

                        self.pending_batch_queue.push(Reverse(QueuedBatch {
                            timestamp,
                            seq,
                            endpoint: endpoint.clone(),
                        }));

                        self.add_ready_batch(endpoint, old_batch);
                    }
                }
            }
        }

        Ok(count)
    }

    /// Seal every open batch whose age reached the batch-making duration.
    pub fn transform_pending_to_ready_by_time(&mut self, now: TimestampNanos) {
        while let Some(Reverse(head)) = self.pending_batch_queue.peek() {
            if head.timestamp.saturating_add(self.batch_making_duration_nanos) > now {
                break;
            }

            let Some(Reverse(cur)) = self.pending_batch_queue.pop() else {
                break;
            };

            // The batch this entry was queued for may already be sealed by size.
            let is_current = self
                .pending_batch
                .get(&cur.endpoint)
                .is_some_and(|batch| batch.seq == cur.seq);
            if !is_current {
                continue;
            }

            if let Some(batch) = self.pending_batch.remove(&cur.endpoint) {
                self.add_ready_batch(cur.endpoint, batch);
            }
        }
    }

    /// Seal every open batch regardless of age.
    pub fn flush_all(&mut self) {
        self.pending_batch_queue.clear();
        let pending: Vec<_> = self.pending_batch.drain().collect();
        for (endpoint, batch) in pending {
            self.add_ready_batch(endpoint, batch);
        }
    }

    /// Take every sealed batch for one endpoint.
    pub fn pop_ready_batches(&mut self) -> Option<(RemoteCallEndpoint, Vec<EncodedEventBatch>)> {
        self.ready_batches.pop_first()
    }

    fn add_ready_batch(&mut self, listener: RemoteCallEndpoint, batch: EncodedEventBatch) {
        self.ready_batches.entry(listener).or_default().push(batch);
    }
}
