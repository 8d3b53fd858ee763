//! Event hub data model and request/response types
//!
//! - `EventField` / `Event` / `EventFilter`: serialized event representation
//! - `EventPayload` / `TopicFilter`: typed events convertible to and from `Event`
//! - `RemoteCallEndpoint`: where a listener wants its batches delivered
//! - Listener management request/response DTOs

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::codec::{self, CodecError};
use crate::core_types::{Principal, TimestampNanos};

/// Topic holding the encoded event type name. Present on every event.
pub const EVENT_NAME_FIELD: &str = "__event_name";

/// Serialized representation of some field of an event
#[derive(Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Debug, Serialize, Deserialize)]
pub struct EventField {
    pub name: String,
    pub value: Vec<u8>,
}

impl EventField {
    /// Encode `value` under `name`.
    pub fn encode<T: Serialize + ?Sized>(name: &str, value: &T) -> Result<Self, CodecError> {
        Ok(Self {
            name: name.to_string(),
            value: codec::encode_value(value)?,
        })
    }
}

/// Serialized event structure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub topics: BTreeSet<EventField>,
    pub values: Vec<EventField>,
}

impl Event {
    /// Decoded name of the event type this event was built from.
    pub fn get_name(&self) -> Result<String, CodecError> {
        let field = self
            .topics
            .iter()
            .find(|field| field.name == EVENT_NAME_FIELD)
            .ok_or_else(|| CodecError::MissingField(EVENT_NAME_FIELD.to_string()))?;

        codec::decode_value(&field.value)
    }

    pub fn is<E: EventPayload>(&self) -> bool {
        self.get_name().is_ok_and(|name| name == E::NAME)
    }

    /// All topics (except the name marker) and values, keyed by field name.
    pub fn into_field_map(self) -> HashMap<String, Vec<u8>> {
        self.topics
            .into_iter()
            .filter(|topic| topic.name != EVENT_NAME_FIELD)
            .chain(self.values)
            .map(|field| (field.name, field.value))
            .collect()
    }
}

/// Typed event that can be turned into an [`Event`] and back.
///
/// Use [`define_event!`](crate::define_event) to implement it.
pub trait EventPayload: Sized {
    const NAME: &'static str;

    fn to_event(&self) -> Result<Event, CodecError>;
    fn from_event(event: Event) -> Result<Self, CodecError>;
}

/// A set of topics of interest of a particular event listener
#[derive(Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventFilter(pub BTreeSet<EventField>);

impl EventFilter {
    /// Filter that matches every event.
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn matches(&self, topics: &BTreeSet<EventField>) -> bool {
        self.0.is_subset(topics)
    }

    pub fn into_field_map(self) -> HashMap<String, Vec<u8>> {
        self.0
            .into_iter()
            .filter(|topic| topic.name != EVENT_NAME_FIELD)
            .map(|field| (field.name, field.value))
            .collect()
    }
}

/// Typed filter generated alongside an [`EventPayload`].
pub trait TopicFilter: Sized {
    fn to_event_filter(&self) -> Result<EventFilter, CodecError>;
    fn from_event_filter(filter: EventFilter) -> Result<Self, CodecError>;
}

/// Listener callback: batches go to `POST {url}/rpc/{method_name}`.
#[derive(Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct RemoteCallEndpoint {
    pub principal: Principal,
    pub url: String,
    pub method_name: String,
}

impl RemoteCallEndpoint {
    pub fn callback_url(&self) -> String {
        format!("{}/rpc/{}", self.url.trim_end_matches('/'), self.method_name)
    }
}

/// Encoded events waiting to be sent to a single endpoint.
#[derive(Debug, Clone)]
pub struct EncodedEventBatch {
    pub content: Vec<u8>,
    pub events_count: usize,
    /// When the first event entered the batch
    pub timestamp: TimestampNanos,
    /// Hub-wide sequence number, distinguishes batches opened in the same instant
    pub seq: u64,
}

impl EncodedEventBatch {
    pub fn new(content: &[u8], timestamp: TimestampNanos, seq: u64) -> Self {
        Self {
            content: Vec::from(content),
            events_count: 1,
            timestamp,
            seq,
        }
    }

    pub fn add_event(&mut self, content: &[u8]) {
        self.content.extend_from_slice(content);
        self.events_count += 1;
    }
}

// ---------- API TYPES ---------------

/// Subscription made by the caller for itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventListener {
    pub filter: EventFilter,
    pub callback_method_name: String,
}

/// Subscription made on behalf of some other endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventListenerExt {
    pub filter: EventFilter,
    pub endpoint: RemoteCallEndpoint,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BecomeEventListenerRequest {
    pub listeners: Vec<EventListener>,
    /// Base URL the caller serves its callbacks on
    pub callback_url: String,
}

pub type StopBeingEventListenerRequest = BecomeEventListenerRequest;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddEventListenersRequest {
    pub listeners: Vec<EventListenerExt>,
}

pub type RemoveEventListenersRequest = AddEventListenersRequest;

/// Per-listener outcome, in request order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoveEventListenersResponse {
    pub results: Vec<Result<(), String>>,
}

pub type StopBeingEventListenerResponse = RemoveEventListenersResponse;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetEventListenersRequest {
    pub filters: Vec<EventFilter>,
}

/// `listeners[i]` are the endpoints matching `filters[i]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetEventListenersResponse {
    pub listeners: Vec<Vec<RemoteCallEndpoint>>,
}
